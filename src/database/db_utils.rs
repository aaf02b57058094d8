use diesel::{
    r2d2::{ConnectionManager, Pool},
    PgConnection,
};

/// Builds the postgres connection pool for the given database url.
///
/// The pool is built lazily so the server (and the test harness) can start
/// before the database is reachable; a dead database surfaces as a 500 on
/// the first checkout instead of a panic here.
pub fn psql_connect_to_db(database_url: &str) -> Pool<ConnectionManager<PgConnection>> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    Pool::builder().build_unchecked(manager)
}
