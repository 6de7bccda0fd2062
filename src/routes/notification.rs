use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
              Set};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::entity::notification_log;
use crate::error::AppError;
use crate::response::ApiResponse;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::get().to(list_notifications)))
        .service(web::resource("/{id}/read").route(web::post().to(mark_read)));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationDto {
    id: i32,
    notification_type: String,
    subject: String,
    message: String,
    sent_at: Option<String>,
    is_read: bool,
}

async fn list_notifications(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let notifications = notification_log::Entity::find()
        .filter(notification_log::Column::RecipientId.eq(auth.user_id))
        .order_by_desc(notification_log::Column::SentAt)
        .limit(50)
        .all(db.get_ref())
        .await?;

    let list: Vec<NotificationDto> = notifications
        .into_iter()
        .map(|n| NotificationDto {
            id: n.id,
            notification_type: n.notification_type,
            subject: n.subject,
            message: n.message,
            sent_at: n.sent_at.map(|d| d.to_rfc3339()),
            is_read: n.is_read,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn mark_read(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let notification = notification_log::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Notification non trouvée.", "notification"))?;

    if notification.recipient_id != auth.user_id {
        return Err(AppError::forbidden());
    }

    let active = notification_log::ActiveModel {
        id: Set(notification.id),
        is_read: Set(true),
        read_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    notification_log::Entity::update(active).exec(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Notification marquée comme lue.")))
}
