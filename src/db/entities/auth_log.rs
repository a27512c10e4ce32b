use base_entity_derive::base_entity;
use sea_orm::entity::prelude::*;

/// Security-relevant history, one row per auth action. Pruned manually, never
/// read on a request path.
#[base_entity]
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_logs")]
pub struct Model {
    #[sea_orm(indexed)]
    pub user_id: Option<Uuid>,
    pub action: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
