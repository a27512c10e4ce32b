use base_entity_derive::base_entity;
use sea_orm::entity::prelude::*;

#[base_entity]
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub failed_attempts: i32,
    pub lock_until: Option<DateTimeWithTimeZone>,
    pub last_login_at: Option<DateTimeWithTimeZone>,
    pub email_verified_at: Option<DateTimeWithTimeZone>,
    pub password_changed_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(has_many)]
    pub refresh_tokens: HasMany<super::refresh_token::Entity>,
    #[sea_orm(has_many)]
    pub email_verifications: HasMany<super::email_verification::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A lock that has passed its deadline no longer counts; the account
    /// unlocks implicitly without a dedicated unlock call.
    pub fn is_locked(&self, now: DateTimeWithTimeZone) -> bool {
        self.lock_until.is_some_and(|until| now < until)
    }
}
