use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::{mobile_device, tenant};

/// `Active -> Used` on redemption, `Active -> Revoked` by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "USED")]
    Used,
    #[sea_orm(string_value = "REVOKED")]
    Revoked,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "provision_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub prefix: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    #[serde(skip_serializing)]
    pub plaintext: Option<String>,
    pub status: ProvisionStatus,
    pub expires_at: DateTimeWithTimeZone,
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
    pub used_by_device_id: Option<Uuid>,
    pub used_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { Tenant, Device }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Tenant => Entity::belongs_to(tenant::Entity).from(Column::TenantId).to(tenant::Column::Id).into(),
            Relation::Device => Entity::belongs_to(mobile_device::Entity).from(Column::DeviceId).to(mobile_device::Column::Id).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
