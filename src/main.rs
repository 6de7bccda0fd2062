use actix_web::{middleware, web, App, HttpServer};
use log::info;

use scol_backend::config::AppConfig;
use scol_backend::db::connect_db;
use scol_backend::mailer::Mailer;
use scol_backend::response::json_error_handler;
use scol_backend::routes::{absence, assignment, auth, classe, major, module, notification,
                           professor, stats, student, threshold, user};
use scol_backend::seed;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env();
    let db = connect_db(&config).await;
    seed::init_defaults(&db, &config).await;
    let mailer = Mailer::from_config(&config);
    let server_port = config.server_port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(mailer.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .service(web::scope("/api/v1")
                .service(web::scope("/auth").configure(auth::config))
                .service(web::scope("/users").configure(user::config))
                .service(web::scope("/students").configure(student::config))
                .service(web::scope("/professors").configure(professor::config))
                .service(web::scope("/majors").configure(major::config))
                .service(web::scope("/modules").configure(module::config))
                .service(web::scope("/classes").configure(classe::config))
                .service(web::scope("/assignments").configure(assignment::config))
                .service(web::scope("/absences").configure(absence::config))
                .service(web::scope("/settings").configure(threshold::config))
                .service(web::scope("/notifications").configure(notification::config))
                .service(web::scope("/stats").configure(stats::config))
            )
    })
    .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}
