use sea_orm::{entity::prelude::*, ConnectionTrait, QueryFilter, Set};
use uuid::Uuid;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenant")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub slug: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Slugs are lowercase ASCII letters, digits and inner hyphens, 2..=48 chars.
pub fn validate_slug(slug: &str) -> Result<(), ModelError> {
    let ok_len = (2..=48).contains(&slug.len());
    let ok_chars = slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    let ok_edges = !slug.starts_with('-') && !slug.ends_with('-');
    if ok_len && ok_chars && ok_edges {
        Ok(())
    } else {
        Err(ModelError::Validation("slug must be 2-48 chars of [a-z0-9-]".into()))
    }
}

pub fn validate_name(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() || name.len() > 128 {
        return Err(ModelError::Validation("name must be 1-128 chars".into()));
    }
    Ok(())
}

pub async fn create<C: ConnectionTrait>(db: &C, slug: &str, name: &str) -> Result<Model, ModelError> {
    validate_slug(slug)?;
    validate_name(name)?;
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slug.to_string()),
        name: Set(name.trim().to_string()),
        logo_url: Set(None),
        primary_color: Set(None),
        created_at: Set(Utc::now().into()),
    };
    Ok(am.insert(db).await?)
}

pub async fn find_by_slug<C: ConnectionTrait>(db: &C, slug: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::Slug.eq(slug)).one(db).await?)
}
