//! Entities stored in the database and their JSON shapes.
//!
//! Every public struct here serializes to the field subset clients see. The
//! password hash lives only on [`UserRecord`], which is never serialized.

use serde::Serialize;
use sqlx::FromRow;

/// A registered account as exposed through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
}

/// Full user row, including credentials.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub password: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub birth_year: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Planet {
    pub id: i64,
    pub name: String,
    pub climate: Option<String>,
    pub terrain: Option<String>,
}

/// Link between a user and exactly one person or planet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Favorite {
    pub id: i64,
    pub user_id: i64,
    pub people_id: Option<i64>,
    pub planet_id: Option<i64>,
}

/// What a favorite points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteTarget {
    Person(i64),
    Planet(i64),
}

impl FavoriteTarget {
    pub fn id(self) -> i64 {
        match self {
            FavoriteTarget::Person(id) | FavoriteTarget::Planet(id) => id,
        }
    }

    /// Capitalized noun used in client-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            FavoriteTarget::Person(_) => "Person",
            FavoriteTarget::Planet(_) => "Planet",
        }
    }

    /// Noun for the favorite itself, as in "Favorite planet not found".
    pub fn favorite_label(self) -> &'static str {
        match self {
            FavoriteTarget::Person(_) => "Favorite person",
            FavoriteTarget::Planet(_) => "Favorite planet",
        }
    }
}
