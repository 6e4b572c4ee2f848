#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::get,
};
use crudquery::{
    CollectionSchema, Comparator, CompilerConfig, FieldPath, ListQuery, PaginateOptions,
    Paginator, Predicate, QueryError, SchemaRegistry, SeaOrmExecutor,
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, sea_query::Query as SqlQuery};
use sea_orm_migration::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

pub const POST_COUNT: i64 = 25;

fn get_test_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string())
}

// RUST_LOG=crudquery=debug shows compiled predicates in test output
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn cleanup_test_tables(db: &DatabaseConnection) {
    let _ = db.execute_unprepared("DROP TABLE IF EXISTS comments").await;
    let _ = db.execute_unprepared("DROP TABLE IF EXISTS posts").await;
    let _ = db.execute_unprepared("DROP TABLE IF EXISTS authors").await;
    let _ = db.execute_unprepared("DROP TABLE IF EXISTS seaql_migrations").await;
}

/// Fresh database with three authors, 25 posts and three comments.
///
/// Post `i` is titled `Rust tips {i}` when `i` is a multiple of 5 and `Post {i}`
/// otherwise, is a draft when `i` is a multiple of 3, has `i * 10` views and
/// belongs to author `(i - 1) % 3 + 1`.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();
    let database_url = get_test_database_url();
    let db = Database::connect(&database_url).await?;
    if !database_url.starts_with("sqlite::memory:") {
        cleanup_test_tables(&db).await;
    }
    Migrator::up(&db, None).await?;
    seed(&db).await?;
    Ok(db)
}

async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    let mut authors = SqlQuery::insert();
    authors
        .into_table(Authors::Table)
        .columns([Authors::Id, Authors::Name, Authors::Email]);
    for (id, name) in [(1, "Ann Lee"), (2, "Bob Stone"), (3, "Cara Diaz")] {
        let email = format!("{}@example.com", name.split(' ').next().unwrap_or(name).to_lowercase());
        authors.values_panic([id.into(), name.into(), email.into()]);
    }
    db.execute(backend.build(&authors)).await?;

    let mut posts = SqlQuery::insert();
    posts.into_table(Posts::Table).columns([
        Posts::Id,
        Posts::Title,
        Posts::Body,
        Posts::Status,
        Posts::Views,
        Posts::AuthorId,
    ]);
    for i in 1..=POST_COUNT {
        let title = if i % 5 == 0 {
            format!("Rust tips {i}")
        } else {
            format!("Post {i}")
        };
        let status = if i % 3 == 0 { "draft" } else { "published" };
        posts.values_panic([
            i.into(),
            title.into(),
            format!("Body {i}").into(),
            status.into(),
            (i * 10).into(),
            ((i - 1) % 3 + 1).into(),
        ]);
    }
    db.execute(backend.build(&posts)).await?;

    let mut comments = SqlQuery::insert();
    comments.into_table(Comments::Table).columns([
        Comments::Id,
        Comments::PostId,
        Comments::AuthorId,
        Comments::Body,
    ]);
    for (id, post_id, author_id, body) in [
        (1, 1, 2, "First!"),
        (2, 1, 3, "Nice post"),
        (3, 2, 1, "Thanks"),
    ] {
        comments.values_panic([id.into(), post_id.into(), author_id.into(), body.into()]);
    }
    db.execute(backend.build(&comments)).await?;
    Ok(())
}

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with(
            CollectionSchema::new("authors", "id")
                .fields(&["name", "email"])
                .searchable(&["name"])
                .has_many("posts", "posts", "id", "author_id"),
        )
        .with(
            CollectionSchema::new("posts", "id")
                .fields(&["title", "body", "status", "views", "author_id"])
                .searchable(&["title"])
                .belongs_to("author", "authors", "author_id", "id")
                .has_many("comments", "comments", "id", "post_id"),
        )
        .with(
            CollectionSchema::new("comments", "id")
                .fields(&["post_id", "author_id", "body"])
                .belongs_to("author", "authors", "author_id", "id")
                .belongs_to("post", "posts", "post_id", "id"),
        )
}

type AppState = Arc<Paginator<SeaOrmExecutor>>;

async fn list_posts(
    State(paginator): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let result = paginator
        .paginate("posts", &query, &PaginateOptions::default())
        .await?;
    let headers: HeaderMap = result.content_range("posts");
    Ok((headers, result))
}

async fn list_author_posts(
    State(paginator): State<AppState>,
    Path(author_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, QueryError> {
    let scope = Predicate::leaf(FieldPath::column("author_id"), Comparator::Eq(json!(author_id)));
    paginator
        .paginate("posts", &query, &PaginateOptions::default().with_mandatory(scope))
        .await
}

pub fn setup_test_app(db: &DatabaseConnection) -> Router {
    setup_test_app_with_config(db, CompilerConfig::default())
}

pub fn setup_test_app_with_config(db: &DatabaseConnection, config: CompilerConfig) -> Router {
    let paginator = Arc::new(Paginator::new(SeaOrmExecutor::new(db.clone(), registry()), config));
    Router::new()
        .route("/posts", get(list_posts))
        .route("/authors/{id}/posts", get(list_author_posts))
        .with_state(paginator)
}

/// GET `uri` and decode the JSON body.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, headers, value)
}

/// Percent-encode a filter tree for the `filter` query parameter.
pub fn encode_filter(filter: &Value) -> String {
    url_escape::encode_component(&filter.to_string()).to_string()
}

/// Values of `field` across the `data` rows of a list response.
pub fn column(body: &Value, field: &str) -> Vec<Value> {
    body["data"]
        .as_array()
        .map(|rows| rows.iter().map(|row| row[field].clone()).collect())
        .unwrap_or_default()
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateBlogTables)]
    }
}

pub struct CreateBlogTables;

impl MigrationName for CreateBlogTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_blog_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateBlogTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Authors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Authors::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Authors::Name).string().not_null())
                    .col(ColumnDef::new(Authors::Email).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Posts::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Posts::Title).string().not_null())
                    .col(ColumnDef::new(Posts::Body).text().not_null())
                    .col(ColumnDef::new(Posts::Status).string().not_null())
                    .col(ColumnDef::new(Posts::Views).integer().not_null())
                    .col(ColumnDef::new(Posts::AuthorId).integer().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Comments::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Comments::PostId).integer().not_null())
                    .col(ColumnDef::new(Comments::AuthorId).integer().not_null())
                    .col(ColumnDef::new(Comments::Body).text().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Authors::Table).to_owned())
            .await
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Authors {
    Table,
    Id,
    Name,
    Email,
}

impl Iden for Authors {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            Self::Table => "authors",
            Self::Id => "id",
            Self::Name => "name",
            Self::Email => "email",
        };
        write!(s, "{name}").unwrap();
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Posts {
    Table,
    Id,
    Title,
    Body,
    Status,
    Views,
    AuthorId,
}

impl Iden for Posts {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            Self::Table => "posts",
            Self::Id => "id",
            Self::Title => "title",
            Self::Body => "body",
            Self::Status => "status",
            Self::Views => "views",
            Self::AuthorId => "author_id",
        };
        write!(s, "{name}").unwrap();
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Comments {
    Table,
    Id,
    PostId,
    AuthorId,
    Body,
}

impl Iden for Comments {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            Self::Table => "comments",
            Self::Id => "id",
            Self::PostId => "post_id",
            Self::AuthorId => "author_id",
            Self::Body => "body",
        };
        write!(s, "{name}").unwrap();
    }
}
