use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use sea_orm::sea_query::StringLen;
use uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::tenant;

/// Revocation is terminal: there is no transition back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "REVOKED")]
    Revoked,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mobile_api_key")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub prefix: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub status: KeyStatus,
    pub created_at: DateTimeWithTimeZone,
    pub revoked_at: Option<DateTimeWithTimeZone>,
    pub last_used_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { Tenant }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self { Relation::Tenant => Entity::belongs_to(tenant::Entity).from(Column::TenantId).to(tenant::Column::Id).into() }
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Insert a fresh ACTIVE key row. Callers pass the keyed hash, never the plaintext.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    tenant_id: Uuid,
    name: &str,
    prefix: &str,
    key_hash: &str,
    now: DateTimeWithTimeZone,
) -> Result<Model, ModelError> {
    if key_hash.len() != 64 { return Err(ModelError::Validation("key_hash must be a hex HMAC-SHA256".into())); }
    if prefix.is_empty() { return Err(ModelError::Validation("prefix required".into())); }
    let am = ActiveModel {
        id: Set(id),
        tenant_id: Set(tenant_id),
        name: Set(name.to_string()),
        prefix: Set(prefix.to_string()),
        key_hash: Set(key_hash.to_string()),
        status: Set(KeyStatus::Active),
        created_at: Set(now),
        revoked_at: Set(None),
        last_used_at: Set(None),
    };
    Ok(am.insert(db).await?)
}
