//! Semaphore-gated pool of synchronous Postgres connections.
//!
//! Grounded on `original_source/code/pool/sqlconnpool.{h,cpp}` and
//! `sqlconnRAII.h`: a fixed-size queue of live connections guarded by
//! a mutex, with a counting semaphore bounding concurrent checkout so
//! callers block instead of over-provisioning connections. `std`
//! doesn't ship a semaphore, so it's built the same way
//! `threadpool::BlockingQueue` builds its bounded queue: a
//! `Mutex<usize>` permit count plus a `Condvar`.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

use postgres::{Client, NoTls};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to postgres: {0}")]
    Connect(#[source] postgres::Error),
    #[error("connection pool exhausted")]
    Exhausted,
    #[error("pool has been closed")]
    Closed,
    #[error(transparent)]
    Query(#[from] postgres::Error),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl DbConfig {
    fn connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.user, self.password, self.dbname
        )
    }
}

struct Permits {
    available: usize,
    closed: bool,
}

/// FIFO of idle connections plus the semaphore that bounds how many
/// are checked out at once. `available` tracks permits, not the
/// length of `idle` directly, so a connection mid-flight to a caller
/// (between `acquire_permit` and the queue pop) is still accounted
/// for.
struct Shared {
    idle: Mutex<VecDeque<Client>>,
    permits: Mutex<Permits>,
    freed: Condvar,
}

impl Shared {
    fn release_permit(&self) {
        let mut permits = self.permits.lock().unwrap();
        permits.available += 1;
        drop(permits);
        self.freed.notify_one();
    }
}

pub struct DbPool {
    shared: std::sync::Arc<Shared>,
    config: DbConfig,
}

impl DbPool {
    /// Opens `size` eagerly-established connections and returns the
    /// pool. Mirrors `SqlConnPool::Init`: every connection is made up
    /// front rather than lazily on first checkout.
    pub fn init(config: DbConfig, size: usize) -> Result<Self, DbError> {
        assert!(size > 0);
        let conn_str = config.connection_string();
        let mut idle = VecDeque::with_capacity(size);
        for _ in 0..size {
            let client = Client::connect(&conn_str, NoTls).map_err(DbError::Connect)?;
            idle.push_back(client);
        }
        let shared = Shared {
            idle: Mutex::new(idle),
            permits: Mutex::new(Permits {
                available: size,
                closed: false,
            }),
            freed: Condvar::new(),
        };
        Ok(DbPool {
            shared: std::sync::Arc::new(shared),
            config,
        })
    }

    pub fn max_size(&self) -> usize {
        self.shared.idle.lock().unwrap().capacity()
    }

    pub fn free_count(&self) -> usize {
        self.shared.idle.lock().unwrap().len()
    }

    /// Blocks until a connection is available, then leases it.
    /// `SqlConnPool::GetConn`'s `sem_wait` plus queue pop, bundled
    /// into one RAII guard that returns the connection on drop.
    pub fn get_conn(&self) -> Result<PooledConnection<'_>, DbError> {
        self.acquire_permit()?;
        let client = self
            .shared
            .idle
            .lock()
            .unwrap()
            .pop_front()
            .expect("permit acquired implies an idle connection exists");
        Ok(PooledConnection {
            client: Some(client),
            shared: &self.shared,
        })
    }

    /// Reconnects and replaces one pooled connection in place. Use
    /// after a connection is found to be broken (e.g. a query
    /// returned a connection error) rather than leaking a permit.
    pub fn replace_conn(&self, broken: Client) -> Result<(), DbError> {
        drop(broken);
        let client = Client::connect(&self.config.connection_string(), NoTls)
            .map_err(DbError::Connect)?;
        self.shared.idle.lock().unwrap().push_back(client);
        self.shared.freed.notify_one();
        Ok(())
    }

    fn acquire_permit(&self) -> Result<(), DbError> {
        let mut permits = self.shared.permits.lock().unwrap();
        loop {
            if permits.closed {
                return Err(DbError::Closed);
            }
            if permits.available > 0 {
                permits.available -= 1;
                return Ok(());
            }
            permits = self.shared.freed.wait(permits).unwrap();
        }
    }

    /// Drains and drops every idle connection, and wakes any blocked
    /// waiters with [`DbError::Closed`]. Mirrors `SqlConnPool::ClosePool`.
    pub fn close(&self) {
        self.shared.idle.lock().unwrap().clear();
        self.shared.permits.lock().unwrap().closed = true;
        self.shared.freed.notify_all();
    }
}

/// RAII lease returned by [`DbPool::get_conn`]. Mirrors `SqlConnRAII`:
/// acquired in the constructor, released on every exit path including
/// panics, by returning the connection to the pool queue and bumping
/// the semaphore.
pub struct PooledConnection<'a> {
    client: Option<Client>,
    shared: &'a Shared,
}

impl Deref for PooledConnection<'_> {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().expect("connection taken before drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("connection taken before drop")
    }
}

impl PooledConnection<'_> {
    /// Takes the underlying connection without returning it to the
    /// idle queue, for a caller that has found it broken and intends
    /// to hand it to [`DbPool::replace_conn`] instead.
    pub fn into_broken(mut self) -> Client {
        self.client.take().expect("connection taken before drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.shared.idle.lock().unwrap().push_back(client);
        }
        self.shared.release_permit();
    }
}
