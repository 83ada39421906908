use sea_orm::{entity::prelude::*, ConnectionTrait, QueryFilter, Set};
use sea_orm::sea_query::{Expr, StringLen};
use uuid::Uuid;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::tenant;

/// Coarse admin role carried in the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[sea_orm(string_value = "OWNER")]
    Owner,
    #[sea_orm(string_value = "TENANT_OWNER")]
    TenantOwner,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "OWNER",
            UserRole::TenantOwner => "TENANT_OWNER",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OWNER" => Some(UserRole::Owner),
            "TENANT_OWNER" => Some(UserRole::TenantOwner),
            "ADMIN" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// `None` only before onboarding completes.
    pub tenant_id: Option<Uuid>,
    #[sea_orm(unique)]
    pub email: String,
    pub role: UserRole,
    pub email_verified: bool,
    pub last_login_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Tenant,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self { Relation::Tenant => Entity::belongs_to(tenant::Entity).from(Column::TenantId).to(tenant::Column::Id).into() }
    }
}

impl Related<tenant::Entity> for Entity {
    fn to() -> RelationDef { Relation::Tenant.def() }
}

impl ActiveModelBehavior for ActiveModel {}

/// Lowercased, trimmed form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), ModelError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid || email.len() > 255 || email.chars().any(char::is_whitespace) {
        return Err(ModelError::Validation("invalid email".into()));
    }
    Ok(())
}

pub async fn create<C: ConnectionTrait>(db: &C, tenant_id: Option<Uuid>, email: &str, role: UserRole) -> Result<Model, ModelError> {
    validate_email(email)?;
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        email: Set(normalize_email(email)),
        role: Set(role),
        email_verified: Set(false),
        last_login_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(am.insert(db).await?)
}

pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::Email.eq(normalize_email(email))).one(db).await?)
}

pub async fn touch_last_login<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<(), ModelError> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    Entity::update_many()
        .col_expr(Column::LastLoginAt, Expr::value(now))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_rules() {
        assert!(validate_email("owner@acme.test").is_ok());
        assert!(validate_email("  Owner@Acme.Test ").is_ok());
        assert!(validate_email("owner").is_err());
        assert!(validate_email("@acme.test").is_err());
        assert!(validate_email("owner@acme").is_err());
        assert!(validate_email("own er@acme.test").is_err());
        assert_eq!(normalize_email("  Owner@Acme.Test "), "owner@acme.test");
    }

    #[test]
    fn role_round_trip() {
        for role in [UserRole::Owner, UserRole::TenantOwner, UserRole::Admin] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("ROOT"), None);
    }
}
