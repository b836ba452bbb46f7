//! PostGIS implementation of [`RoadSource`].
//!
//! Tiles come from the `get_roads_mvt(z, x, y)` database function; GeoJSON and
//! statistics are computed in SQL over the `roads` table.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::SourceError;
use crate::tile::TileCoord;

use super::{Bounds, ConnectionInfo, PgPool, RoadSource, RoadStats};

const TILE_SQL: &str = "SELECT get_roads_mvt($1::int4, $2::int4, $3::int4) AS mvt";

const ALL_ROADS_SQL: &str = r"
SELECT jsonb_build_object(
    'type', 'FeatureCollection',
    'features', coalesce(jsonb_agg(feature), '[]'::jsonb)
) AS geojson
FROM (
    SELECT jsonb_build_object(
        'type', 'Feature',
        'id', id,
        'geometry', ST_AsGeoJSON(geom)::jsonb,
        'properties', jsonb_build_object(
            'name', name,
            'road_type', road_type,
            'created_at', created_at
        )
    ) AS feature
    FROM roads
) features";

const ROADS_IN_BOUNDS_SQL: &str = r"
SELECT jsonb_build_object(
    'type', 'FeatureCollection',
    'features', coalesce(jsonb_agg(feature), '[]'::jsonb)
) AS geojson
FROM (
    SELECT jsonb_build_object(
        'type', 'Feature',
        'id', id,
        'geometry', ST_AsGeoJSON(geom)::jsonb,
        'properties', jsonb_build_object(
            'name', name,
            'road_type', road_type,
            'created_at', created_at
        )
    ) AS feature
    FROM roads
    WHERE geom && ST_MakeEnvelope($1, $2, $3, $4, 4326)
) features";

const STATS_SQL: &str = r"
SELECT
    count(*)::int8 AS total_roads,
    count(DISTINCT road_type)::int8 AS road_types,
    ST_Extent(geom)::text AS bounds,
    (sum(ST_Length(geom::geography)) / 1000)::float8 AS total_length_km
FROM roads";

const CONNECTION_SQL: &str = r"
SELECT
    now()::text AS time,
    version() AS version,
    current_database()::text AS database,
    current_user::text AS username";

/// Road source backed by a PostGIS database.
#[derive(Clone, Debug)]
pub struct PgRoadSource {
    pool: PgPool,
}

impl PgRoadSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn feature_collection(
        &self,
        context: &'static str,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Value, SourceError> {
        let row = self.pool.query_opt(context, sql, params).await?;
        let geojson = row
            .map(|r| r.try_get::<_, Option<Value>>("geojson"))
            .transpose()
            .map_err(|e| decode_error(context, e))?
            .flatten();
        Ok(geojson.unwrap_or_else(empty_feature_collection))
    }
}

#[async_trait]
impl RoadSource for PgRoadSource {
    async fn get_tile(&self, coord: TileCoord) -> Result<Option<Bytes>, SourceError> {
        debug!(%coord, "SQL: {TILE_SQL}");
        // x and y are below 2^22, so they always fit an int4
        let z = i32::from(coord.z());
        let x = coord.x() as i32;
        let y = coord.y() as i32;
        let row = self
            .pool
            .query_opt("rendering tile", TILE_SQL, &[&z, &x, &y])
            .await?;

        let mvt = row
            .map(|r| r.try_get::<_, Option<Vec<u8>>>("mvt"))
            .transpose()
            .map_err(|e| decode_error("rendering tile", e))?
            .flatten();
        Ok(mvt.map(Bytes::from))
    }

    async fn roads_geojson(&self) -> Result<Value, SourceError> {
        self.feature_collection("fetching all roads", ALL_ROADS_SQL, &[])
            .await
    }

    async fn roads_in_bounds(&self, bounds: Bounds) -> Result<Value, SourceError> {
        self.feature_collection(
            "fetching roads by bounds",
            ROADS_IN_BOUNDS_SQL,
            &[
                &bounds.min_lng,
                &bounds.min_lat,
                &bounds.max_lng,
                &bounds.max_lat,
            ],
        )
        .await
    }

    async fn stats(&self) -> Result<RoadStats, SourceError> {
        const CONTEXT: &str = "computing road statistics";
        let row = self
            .pool
            .query_opt(CONTEXT, STATS_SQL, &[])
            .await?
            .ok_or_else(|| SourceError::Query {
                context: CONTEXT,
                message: "aggregate returned no rows".to_string(),
            })?;

        let decode = |e| decode_error(CONTEXT, e);
        Ok(RoadStats {
            total_roads: row.try_get("total_roads").map_err(decode)?,
            road_types: row.try_get("road_types").map_err(decode)?,
            bounds: row.try_get("bounds").map_err(decode)?,
            total_length_km: row.try_get("total_length_km").map_err(decode)?,
        })
    }

    async fn check_connection(&self) -> Result<ConnectionInfo, SourceError> {
        const CONTEXT: &str = "testing the connection";
        let row = self
            .pool
            .query_opt(CONTEXT, CONNECTION_SQL, &[])
            .await?
            .ok_or_else(|| SourceError::Query {
                context: CONTEXT,
                message: "connection check returned no rows".to_string(),
            })?;

        let decode = |e| decode_error(CONTEXT, e);
        Ok(ConnectionInfo {
            time: row.try_get("time").map_err(decode)?,
            database: row.try_get("database").map_err(decode)?,
            user: row.try_get("username").map_err(decode)?,
            version: row.try_get("version").map_err(decode)?,
        })
    }
}

fn decode_error(context: &'static str, e: tokio_postgres::Error) -> SourceError {
    SourceError::Query {
        context,
        message: format!("unexpected column type: {e}"),
    }
}

/// `{"type": "FeatureCollection", "features": []}`
pub(crate) fn empty_feature_collection() -> Value {
    json!({ "type": "FeatureCollection", "features": [] })
}
