use crate::entities::{prelude::*, search_metrics};
use crate::models::{MovieSnapshot, UsageRecord};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

pub struct UsageRepository {
    conn: DatabaseConnection,
}

impl UsageRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: search_metrics::Model) -> UsageRecord {
        UsageRecord {
            id: model.id.to_string(),
            query: model.search_term,
            count: model.count,
            movie: MovieSnapshot {
                movie_id: model.movie_id,
                title: model.title,
                poster_url: model.poster_url,
            },
        }
    }

    pub async fn find_by_term(&self, term: &str) -> Result<Option<UsageRecord>, DbErr> {
        let row = SearchMetrics::find()
            .filter(search_metrics::Column::SearchTerm.eq(term))
            .one(&self.conn)
            .await?;

        Ok(row.map(Self::map_model))
    }

    pub async fn insert(&self, term: &str, movie: &MovieSnapshot) -> Result<UsageRecord, DbErr> {
        let now = chrono::Utc::now().to_rfc3339();

        let active_model = search_metrics::ActiveModel {
            search_term: Set(term.to_string()),
            count: Set(1),
            movie_id: Set(movie.movie_id.clone()),
            title: Set(movie.title.clone()),
            poster_url: Set(movie.poster_url.clone()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = SearchMetrics::insert(active_model).exec(&self.conn).await?;

        Ok(UsageRecord {
            id: result.last_insert_id.to_string(),
            query: term.to_string(),
            count: 1,
            movie: movie.clone(),
        })
    }

    /// Returns the number of rows touched.
    pub async fn set_count(&self, id: i32, count: i64) -> Result<u64, DbErr> {
        let result = SearchMetrics::update_many()
            .col_expr(search_metrics::Column::Count, Expr::value(count))
            .col_expr(
                search_metrics::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(search_metrics::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn top(&self, limit: u64) -> Result<Vec<UsageRecord>, DbErr> {
        let rows = SearchMetrics::find()
            .order_by_desc(search_metrics::Column::Count)
            .order_by_asc(search_metrics::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }
}
