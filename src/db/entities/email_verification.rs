use base_entity_derive::base_entity;
use sea_orm::entity::prelude::*;

#[base_entity]
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "email_verifications")]
pub struct Model {
    #[sea_orm(indexed)]
    pub user_id: Uuid,
    pub code: String,
    pub expires_at: DateTimeWithTimeZone,
    pub used: bool,
    pub used_at: Option<DateTimeWithTimeZone>,
    pub ip_address: Option<String>,
    #[sea_orm(belongs_to, from = "user_id", to = "id", on_delete = "Cascade")]
    pub user: HasOne<super::user::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_expired(&self, now: DateTimeWithTimeZone) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid(&self, now: DateTimeWithTimeZone) -> bool {
        !self.used && !self.is_expired(now)
    }
}
