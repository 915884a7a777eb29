pub mod calendar;
pub mod json_error;
pub mod jwt;
pub mod login;
pub mod register;
pub mod server_config;

pub use self::calendar::{
    AuthorizationUrl, CalendarCheckResponse, CalendarEvent, CalendarStatus, CreatedEvent, EventTime,
    GameEventRequest,
};
pub use self::json_error::ErrorResponse;
pub use self::jwt::JwtClaims;
pub use self::login::{LoginData, LoginError, LoginResponse, UserProfile};
pub use self::register::{RegistrationData, RegistrationError, RegistrationResponse};
pub use self::server_config::{AppConfig, ConfigError};
