//! Settings, translations and service wiring shared by the integration tests

use chrono::Utc;
use fake::{faker::name::en::Name, Fake};

use eventdesk::config::Settings;
use eventdesk::database::DatabaseService;
use eventdesk::i18n::I18n;
use eventdesk::jobs::JobQueue;
use eventdesk::models::{User, UserRole};
use eventdesk::services::{AuthService, CertificateService, CheckInService, EventService, SurveyService, TicketService};

pub const TEST_SIGNING_SECRET: &str = "integration-test-signing-secret-0123456789";

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.bot.token = test_bot_token();
    settings.tickets.signing_secret = TEST_SIGNING_SECRET.to_string();
    settings
}

pub fn test_bot_token() -> String {
    "12345:test_token".to_string()
}

/// English and Russian translations straight from the repository
pub fn test_i18n(settings: &Settings) -> I18n {
    let mut i18n = I18n::new(&settings.i18n);
    i18n.insert_language("en", include_str!("../../translations/en.json"))
        .expect("Failed to load en translations");
    i18n.insert_language("ru", include_str!("../../translations/ru.json"))
        .expect("Failed to load ru translations");
    i18n
}

/// A user that only lives in memory, for tests that never touch the database
pub fn detached_user(id: i64, telegram_id: i64, language_code: &str) -> User {
    let now = Utc::now();
    User {
        id,
        telegram_id,
        username: None,
        first_name: Some(Name().fake()),
        last_name: None,
        full_name: None,
        language_code: language_code.to_string(),
        role: UserRole::Participant,
        is_banned: false,
        created_at: now,
        updated_at: now,
    }
}

/// The database-backed services, wired the way the bot wires them
pub struct TestServices {
    pub events: EventService,
    pub checkin: CheckInService,
    pub certificates: CertificateService,
    pub surveys: SurveyService,
    pub tickets: TicketService,
    pub jobs: JobQueue,
}

impl TestServices {
    pub fn new(db: &DatabaseService, settings: &Settings) -> Self {
        let jobs = JobQueue::new(db.jobs.clone(), &settings.jobs);
        let auth = AuthService::new(settings);
        let tickets = TicketService::new(&settings.tickets);

        Self {
            events: EventService::new(db.clone(), auth.clone(), jobs.clone(), settings.clone()),
            checkin: CheckInService::new(db.clone(), auth, tickets.clone(), jobs.clone(), settings.clone()),
            certificates: CertificateService::new(db.clone(), settings.certificates.clone()),
            surveys: SurveyService::new(db.clone()),
            tickets,
            jobs,
        }
    }
}
