//! SQLite-backed store for users, people, planets and favorites.
//!
//! Uniqueness rules (one account per email, one favorite per user/target pair)
//! live in the schema. Inserts use `ON CONFLICT DO NOTHING` and report whether
//! a row was written, so concurrent duplicates cannot slip through.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::models::{Favorite, FavoriteTarget, Person, Planet, User, UserRecord};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );
        "#,
    ),
    (
        "people",
        r#"
        CREATE TABLE IF NOT EXISTS people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            birth_year TEXT,
            gender TEXT
        );
        "#,
    ),
    (
        "planets",
        r#"
        CREATE TABLE IF NOT EXISTS planets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            climate TEXT,
            terrain TEXT
        );
        "#,
    ),
    (
        "favorites",
        r#"
        CREATE TABLE IF NOT EXISTS favorites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            people_id INTEGER REFERENCES people(id) ON DELETE CASCADE,
            planet_id INTEGER REFERENCES planets(id) ON DELETE CASCADE,
            CHECK ((people_id IS NULL) <> (planet_id IS NULL))
        );
        "#,
    ),
    (
        "favorites_user_person",
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS favorites_user_person
            ON favorites (user_id, people_id) WHERE people_id IS NOT NULL;
        "#,
    ),
    (
        "favorites_user_planet",
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS favorites_user_planet
            ON favorites (user_id, planet_id) WHERE planet_id IS NOT NULL;
        "#,
    ),
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid database url {url}: {source}")]
    InvalidUrl { url: String, source: sqlx::Error },
    #[error("failed to open database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("failed to create {object}: {source}")]
    Schema {
        object: &'static str,
        source: sqlx::Error,
    },
    #[error("user {0} does not exist")]
    UnknownUser(i64),
    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),
}

/// New person row, used when seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    pub birth_year: Option<String>,
    pub gender: Option<String>,
}

/// New planet row, used when seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlanet {
    pub name: String,
    pub climate: Option<String>,
    pub terrain: Option<String>,
}

/// Cloneable handle to the connection pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url`.
    ///
    /// In-memory databases exist per connection, so they get a single pooled
    /// connection that never idles out.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|source| StoreError::InvalidUrl {
                url: url.to_string(),
                source,
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(DEFAULT_MAX_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(StoreError::Connect)?;
        Ok(Self { pool })
    }

    /// Create tables and indexes that do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for &(object, statement) in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|source| StoreError::Schema { object, source })?;
        }
        info!("database schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert an active user. Returns `None` when the email is already taken.
    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password, is_active) VALUES (?, ?, 1)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, password, is_active FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>("SELECT id, email FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn list_people(&self) -> Result<Vec<Person>, StoreError> {
        let people = sqlx::query_as::<_, Person>(
            "SELECT id, name, birth_year, gender FROM people ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(people)
    }

    pub async fn get_person(&self, id: i64) -> Result<Option<Person>, StoreError> {
        let person = sqlx::query_as::<_, Person>(
            "SELECT id, name, birth_year, gender FROM people WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(person)
    }

    pub async fn insert_person(&self, person: &NewPerson) -> Result<Person, StoreError> {
        let row = sqlx::query_as::<_, Person>(
            r#"
            INSERT INTO people (name, birth_year, gender) VALUES (?, ?, ?)
            RETURNING id, name, birth_year, gender
            "#,
        )
        .bind(&person.name)
        .bind(&person.birth_year)
        .bind(&person.gender)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_planets(&self) -> Result<Vec<Planet>, StoreError> {
        let planets = sqlx::query_as::<_, Planet>(
            "SELECT id, name, climate, terrain FROM planets ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(planets)
    }

    pub async fn get_planet(&self, id: i64) -> Result<Option<Planet>, StoreError> {
        let planet = sqlx::query_as::<_, Planet>(
            "SELECT id, name, climate, terrain FROM planets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(planet)
    }

    pub async fn insert_planet(&self, planet: &NewPlanet) -> Result<Planet, StoreError> {
        let row = sqlx::query_as::<_, Planet>(
            r#"
            INSERT INTO planets (name, climate, terrain) VALUES (?, ?, ?)
            RETURNING id, name, climate, terrain
            "#,
        )
        .bind(&planet.name)
        .bind(&planet.climate)
        .bind(&planet.terrain)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Whether the favorite's target row exists.
    pub async fn target_exists(&self, target: FavoriteTarget) -> Result<bool, StoreError> {
        let found = match target {
            FavoriteTarget::Person(id) => self.get_person(id).await?.is_some(),
            FavoriteTarget::Planet(id) => self.get_planet(id).await?.is_some(),
        };
        Ok(found)
    }

    pub async fn list_favorites(&self, user_id: i64) -> Result<Vec<Favorite>, StoreError> {
        let favorites = sqlx::query_as::<_, Favorite>(
            r#"
            SELECT id, user_id, people_id, planet_id
            FROM favorites
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(favorites)
    }

    /// Record a favorite. Returns `false` when the user already has it.
    ///
    /// A `user_id` with no row fails with [`StoreError::UnknownUser`].
    pub async fn add_favorite(
        &self,
        user_id: i64,
        target: FavoriteTarget,
    ) -> Result<bool, StoreError> {
        let statement = match target {
            FavoriteTarget::Person(_) => {
                "INSERT INTO favorites (user_id, people_id) VALUES (?, ?) ON CONFLICT DO NOTHING"
            }
            FavoriteTarget::Planet(_) => {
                "INSERT INTO favorites (user_id, planet_id) VALUES (?, ?) ON CONFLICT DO NOTHING"
            }
        };
        let result = sqlx::query(statement)
            .bind(user_id)
            .bind(target.id())
            .execute(&self.pool)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    StoreError::UnknownUser(user_id)
                }
                other => StoreError::Query(other),
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a favorite. Returns `false` when there was nothing to delete.
    pub async fn remove_favorite(
        &self,
        user_id: i64,
        target: FavoriteTarget,
    ) -> Result<bool, StoreError> {
        let statement = match target {
            FavoriteTarget::Person(_) => {
                "DELETE FROM favorites WHERE user_id = ? AND people_id = ?"
            }
            FavoriteTarget::Planet(_) => {
                "DELETE FROM favorites WHERE user_id = ? AND planet_id = ?"
            }
        };
        let result = sqlx::query(statement)
            .bind(user_id)
            .bind(target.id())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::{is_in_memory, NewPerson, NewPlanet, Store, StoreError};
    use crate::models::FavoriteTarget;

    async fn memory_store() -> Result<Store> {
        let store = Store::connect("sqlite::memory:").await?;
        store.migrate().await?;
        Ok(store)
    }

    fn tatooine() -> NewPlanet {
        NewPlanet {
            name: String::from("Tatooine"),
            climate: Some(String::from("arid")),
            terrain: Some(String::from("desert")),
        }
    }

    fn luke() -> NewPerson {
        NewPerson {
            name: String::from("Luke Skywalker"),
            birth_year: Some(String::from("19BBY")),
            gender: Some(String::from("male")),
        }
    }

    #[test]
    fn in_memory_urls_are_detected() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:db?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://swapi-favorites.db"));
    }

    #[tokio::test]
    async fn migrate_is_idempotent() -> Result<()> {
        let store = memory_store().await?;
        store.migrate().await?;
        store.ping().await?;
        Ok(())
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() -> Result<()> {
        let store = memory_store().await?;

        let first = store.create_user("a@b.com", "hash-1").await?;
        assert_eq!(first.map(|u| u.email), Some(String::from("a@b.com")));

        let second = store.create_user("a@b.com", "hash-2").await?;
        assert!(second.is_none());
        assert_eq!(store.list_users().await?.len(), 1);

        let record = store.find_user_by_email("a@b.com").await?.unwrap();
        assert_eq!(record.password, "hash-1");
        assert!(record.is_active);
        Ok(())
    }

    #[tokio::test]
    async fn people_and_planets_round_trip_by_id() -> Result<()> {
        let store = memory_store().await?;
        let planet = store.insert_planet(&tatooine()).await?;
        let person = store.insert_person(&luke()).await?;

        assert_eq!(store.get_planet(planet.id).await?, Some(planet.clone()));
        assert_eq!(store.get_person(person.id).await?, Some(person.clone()));
        assert_eq!(store.get_planet(planet.id + 100).await?, None);
        assert_eq!(store.list_planets().await?, vec![planet]);
        assert_eq!(store.list_people().await?, vec![person]);
        Ok(())
    }

    #[tokio::test]
    async fn favorites_are_unique_per_user_and_target() -> Result<()> {
        let store = memory_store().await?;
        let user = store.create_user("a@b.com", "hash").await?.unwrap();
        let planet = store.insert_planet(&tatooine()).await?;
        let person = store.insert_person(&luke()).await?;

        assert!(store.add_favorite(user.id, FavoriteTarget::Planet(planet.id)).await?);
        assert!(!store.add_favorite(user.id, FavoriteTarget::Planet(planet.id)).await?);
        assert!(store.add_favorite(user.id, FavoriteTarget::Person(person.id)).await?);

        let favorites = store.list_favorites(user.id).await?;
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].planet_id, Some(planet.id));
        assert_eq!(favorites[0].people_id, None);
        assert_eq!(favorites[1].people_id, Some(person.id));
        Ok(())
    }

    #[tokio::test]
    async fn favorites_are_scoped_to_their_user() -> Result<()> {
        let store = memory_store().await?;
        let alice = store.create_user("alice@b.com", "hash").await?.unwrap();
        let bob = store.create_user("bob@b.com", "hash").await?.unwrap();
        let planet = store.insert_planet(&tatooine()).await?;

        assert!(store.add_favorite(alice.id, FavoriteTarget::Planet(planet.id)).await?);
        assert!(store.add_favorite(bob.id, FavoriteTarget::Planet(planet.id)).await?);
        assert!(store.remove_favorite(alice.id, FavoriteTarget::Planet(planet.id)).await?);

        assert!(store.list_favorites(alice.id).await?.is_empty());
        assert_eq!(store.list_favorites(bob.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn favorite_for_unknown_user_is_reported() -> Result<()> {
        let store = memory_store().await?;
        let planet = store.insert_planet(&tatooine()).await?;

        let err = store
            .add_favorite(999, FavoriteTarget::Planet(planet.id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownUser(999)));
        assert!(store.list_favorites(999).await?.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_duplicate_adds_store_one_row() -> Result<()> {
        let dir = tempdir()?;
        let url = format!("sqlite://{}", dir.path().join("race.db").display());
        let store = Store::connect(&url).await?;
        store.migrate().await?;
        let user = store.create_user("a@b.com", "hash").await?.unwrap();
        let planet = store.insert_planet(&tatooine()).await?;
        let target = FavoriteTarget::Planet(planet.id);

        let (first, second) = tokio::join!(
            store.add_favorite(user.id, target),
            store.add_favorite(user.id, target),
        );
        let inserted = [first?, second?].iter().filter(|added| **added).count();

        assert_eq!(inserted, 1);
        assert_eq!(store.list_favorites(user.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn remove_missing_favorite_reports_false() -> Result<()> {
        let store = memory_store().await?;
        let user = store.create_user("a@b.com", "hash").await?.unwrap();
        let person = store.insert_person(&luke()).await?;

        assert!(!store.remove_favorite(user.id, FavoriteTarget::Person(person.id)).await?);
        assert!(store.add_favorite(user.id, FavoriteTarget::Person(person.id)).await?);
        assert!(!store.remove_favorite(user.id, FavoriteTarget::Planet(person.id)).await?);
        assert!(store.remove_favorite(user.id, FavoriteTarget::Person(person.id)).await?);
        assert!(store.list_favorites(user.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn target_exists_checks_the_right_table() -> Result<()> {
        let store = memory_store().await?;
        let planet = store.insert_planet(&tatooine()).await?;

        assert!(store.target_exists(FavoriteTarget::Planet(planet.id)).await?);
        assert!(!store.target_exists(FavoriteTarget::Person(planet.id)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn file_database_persists_across_connections() -> Result<()> {
        let dir = tempdir()?;
        let url = format!("sqlite://{}", dir.path().join("swapi.db").display());

        {
            let store = Store::connect(&url).await?;
            store.migrate().await?;
            store.insert_planet(&tatooine()).await?;
        }

        let store = Store::connect(&url).await?;
        store.migrate().await?;
        assert_eq!(store.list_planets().await?.len(), 1);
        Ok(())
    }
}
