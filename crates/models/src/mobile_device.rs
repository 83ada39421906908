use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use sea_orm::sea_query::StringLen;
use uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::{mobile_api_key, tenant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "DISABLED")]
    Disabled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mobile_device")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[sea_orm(unique)]
    pub api_key_id: Option<Uuid>,
    pub name: String,
    pub status: DeviceStatus,
    pub active_event_id: Option<Uuid>,
    pub last_seen_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { Tenant, ApiKey }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Tenant => Entity::belongs_to(tenant::Entity).from(Column::TenantId).to(tenant::Column::Id).into(),
            Relation::ApiKey => Entity::belongs_to(mobile_api_key::Entity).from(Column::ApiKeyId).to(mobile_api_key::Column::Id).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_name(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() || name.len() > 128 {
        return Err(ModelError::Validation("device name must be 1-128 chars".into()));
    }
    Ok(())
}

pub async fn create<C: ConnectionTrait>(
    db: &C,
    tenant_id: Uuid,
    api_key_id: Option<Uuid>,
    name: &str,
    now: DateTimeWithTimeZone,
) -> Result<Model, ModelError> {
    validate_name(name)?;
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        api_key_id: Set(api_key_id),
        name: Set(name.trim().to_string()),
        status: Set(DeviceStatus::Active),
        active_event_id: Set(None),
        last_seen_at: Set(None),
        created_at: Set(now),
    };
    Ok(am.insert(db).await?)
}
