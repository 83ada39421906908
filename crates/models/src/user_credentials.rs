//! Password hashes (PHC strings), one row per user keyed by `user_id`.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::user;

/// Algorithms the auth layer knows how to verify.
pub const KNOWN_ALGORITHMS: &[&str] = &["argon2", "argon2id"];

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub password_algorithm: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { User }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::User => Entity::belongs_to(user::Entity)
                .from(Column::UserId)
                .to(user::Column::Id)
                .into(),
        }
    }
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef { Relation::User.def() }
}

impl ActiveModelBehavior for ActiveModel {}

pub async fn find_by_user<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find_by_id(user_id).one(db).await?)
}

/// Insert or replace the user's hash in one statement, so two concurrent
/// resets cannot leave two rows or lose the insert.
pub async fn upsert_password<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    password_hash: String,
    algorithm: &str,
) -> Result<Model, ModelError> {
    if password_hash.trim().is_empty() {
        return Err(ModelError::Validation("password hash required".into()));
    }
    if !KNOWN_ALGORITHMS.contains(&algorithm) {
        return Err(ModelError::Validation(format!("unknown password algorithm: {algorithm}")));
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let am = ActiveModel {
        user_id: Set(user_id),
        password_hash: Set(password_hash),
        password_algorithm: Set(algorithm.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let on_conflict = OnConflict::column(Column::UserId)
        .update_columns([Column::PasswordHash, Column::PasswordAlgorithm, Column::UpdatedAt])
        .to_owned();
    Ok(Entity::insert(am).on_conflict(on_conflict).exec_with_returning(db).await?)
}
