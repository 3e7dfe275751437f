//! Register/login verification against the `user(username, password)`
//! table, grounded on `original_source/code/http/httprequest.cpp`'s
//! `UserVerify` but switched to parameterized queries: the original
//! concatenates the username/password directly into the SQL string
//! (flagged in spec.md §4.H as injection-vulnerable), which this port
//! fixes while keeping the same success/failure contract.

use dbpool::DbPool;

/// Checks (login) or registers (!login) a username/password pair.
/// Empty credentials always fail without touching the database.
pub fn user_verify(pool: &DbPool, name: &str, pwd: &str, is_login: bool) -> bool {
    if name.is_empty() || pwd.is_empty() {
        return false;
    }

    let Ok(mut conn) = pool.get_conn() else {
        return false;
    };

    let row = conn.query_opt(
        "SELECT username, password FROM \"user\" WHERE username = $1 LIMIT 1",
        &[&name],
    );
    let existing: Option<String> = match row {
        Ok(Some(r)) => r.try_get::<_, String>(1).ok(),
        Ok(None) => None,
        Err(_) => {
            let _ = pool.replace_conn(conn.into_broken());
            return false;
        }
    };

    match (is_login, existing) {
        (true, Some(stored_pwd)) => stored_pwd == pwd,
        (true, None) => false,
        (false, Some(_)) => false,
        (false, None) => {
            let ok = conn.execute(
                "INSERT INTO \"user\" (username, password) VALUES ($1, $2)",
                &[&name, &pwd],
            );
            match ok {
                Ok(_) => true,
                Err(_) => {
                    let _ = pool.replace_conn(conn.into_broken());
                    false
                }
            }
        }
    }
}

// `user_verify`'s empty-credential short-circuit and its SQL shape are
// covered directly; the success/failure branches need a live Postgres
// instance and are exercised in integration tests instead.
