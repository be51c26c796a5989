//! Database service layer
//! 
//! Groups the repositories behind one cloneable handle

use crate::database::{
    DatabasePool, UserRepository, EventRepository, RegistrationRepository, AttendanceRepository,
    CertificateRepository, SurveyRepository, JobRepository, AnalyticsRepository,
};
use crate::utils::errors::EventDeskError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub pool: DatabasePool,
    pub users: UserRepository,
    pub events: EventRepository,
    pub registrations: RegistrationRepository,
    pub attendance: AttendanceRepository,
    pub certificates: CertificateRepository,
    pub surveys: SurveyRepository,
    pub jobs: JobRepository,
    pub analytics: AnalyticsRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            registrations: RegistrationRepository::new(pool.clone()),
            attendance: AttendanceRepository::new(pool.clone()),
            certificates: CertificateRepository::new(pool.clone()),
            surveys: SurveyRepository::new(pool.clone()),
            jobs: JobRepository::new(pool.clone()),
            analytics: AnalyticsRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn health_check(&self) -> Result<(), EventDeskError> {
        crate::database::health_check(&self.pool).await
    }
}
