use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_header: String,
    pub app_name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub mail_sender: String,
    pub admin_email: String,
    pub default_professor_threshold_days: i32,
    pub default_professor_threshold_hours: i32,
    pub warning_percentage: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(5000);

        let sqlite_path = env::var("SQLITE_PATH").unwrap_or_else(|_| "data/scol.sqlite".to_string());
        let database_url = env::var("DATABASE_URL").ok();

        let jwt_secret = env::var("SECRET_KEY")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| "cle-secrete-de-developpement".to_string());

        let token_header = env::var("TOKEN_HEADER").unwrap_or_else(|_| "token".to_string());

        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "Gestion Scolaire".to_string());

        let smtp_host = env::var("MAIL_SERVER").unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let smtp_port = env::var("MAIL_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(587);
        let smtp_username = env::var("MAIL_USERNAME").ok().filter(|v| !v.is_empty());
        let smtp_password = env::var("MAIL_PASSWORD").ok().filter(|v| !v.is_empty());
        let mail_sender = env::var("MAIL_DEFAULT_SENDER")
            .unwrap_or_else(|_| "noreply@gestionscol.tn".to_string());
        let admin_email = env::var("MAIL_ADMIN_EMAIL")
            .unwrap_or_else(|_| "admin@gestionscol.tn".to_string());

        let default_professor_threshold_days = env::var("DEFAULT_PROFESSOR_THRESHOLD_DAYS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(2);
        let default_professor_threshold_hours = env::var("DEFAULT_PROFESSOR_THRESHOLD_HOURS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(4);
        let warning_percentage = env::var("WARNING_THRESHOLD_PERCENTAGE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(50.0);

        Self {
            server_port,
            sqlite_path,
            database_url,
            jwt_secret,
            token_header,
            app_name,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            mail_sender,
            admin_email,
            default_professor_threshold_days,
            default_professor_threshold_hours,
            warning_percentage,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}", path)
    }
}
