//! Server loop (component K): accept loop, event dispatch, task
//! submission to the worker pool, startup/shutdown lifecycle.
//! Grounded on `original_source/code/server/webserver.cpp`'s
//! `WebServer` for the loop shape (`dealListen_`/`dealRead_`/
//! `dealWrite_`/`onRead_`/`onWrite_`/`onProcess_`) and the teacher's
//! `src/server.rs` stub, which this replaces entirely.
//!
//! One-shot exclusivity is expressed here by *moving* a connection's
//! ownership out of `connections` into the worker closure for the
//! duration of its I/O, rather than sharing it behind a lock: the
//! reactor won't deliver another event for that fd until the main
//! thread calls `mod_fd` after the worker reports back, so at most one
//! thread ever touches a given `HttpConnection` at a time.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, ErrorKind, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use dbpool::{DbConfig, DbPool};
use mio::net::TcpListener;
use threadpool::ThreadPool;
use timer::HeapTimer;

use crate::config::{AppConfig, ServerConfig};
use crate::error::ServerError;
use crate::http::{HttpConnection, ReadOutcome, WriteOutcome};
use crate::reactor::Reactor;
use crate::timeouts::{self, PendingClose};

const MAX_EVENTS: usize = 1024;
const LISTEN_BACKLOG: i32 = 1024;

enum NextStep {
    ReadAgain,
    WriteAgain,
    Close,
}

type Completion = (RawFd, HttpConnection, NextStep);

pub struct Server {
    reactor: Reactor,
    timer: HeapTimer,
    thread_pool: ThreadPool,
    db: Arc<DbPool>,
    timeout: Option<Duration>,
    edge_triggered_conn: bool,
    edge_triggered_listen: bool,
    listeners: HashMap<RawFd, (TcpListener, Vec<Arc<ServerConfig>>)>,
    connections: HashMap<RawFd, HttpConnection>,
    pending_close: PendingClose,
    active_connections: Arc<AtomicUsize>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl Server {
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        if config.open_log {
            let level = match config.log_level {
                0 => proxy_log::Level::Debug,
                1 => proxy_log::Level::Info,
                2 => proxy_log::Level::Warn,
                _ => proxy_log::Level::Error,
            };
            proxy_log::init(level, "./log", ".log", config.log_que_size)?;
        }

        let db = DbPool::init(
            DbConfig {
                host: config.sql_host.clone(),
                port: config.sql_port,
                user: config.sql_user.clone(),
                password: config.sql_pwd.clone(),
                dbname: config.sql_db_name.clone(),
            },
            config.sql_conn_num,
        )?;

        let config_list: Vec<Arc<ServerConfig>> =
            config.servers.iter().cloned().map(Arc::new).collect();

        // trigMode: 0 both LT, 1 conn ET, 2 listen ET, 3 both ET.
        let edge_triggered_conn = matches!(config.trig_mode, 1 | 3);
        let edge_triggered_listen = matches!(config.trig_mode, 2 | 3);

        let mut ports: BTreeSet<u16> = BTreeSet::new();
        for s in &config_list {
            for p in &s.ports {
                ports.insert(*p);
            }
        }
        if ports.is_empty() {
            ports.insert(config.port);
        }

        let reactor = Reactor::new(MAX_EVENTS)?;
        let mut listeners = HashMap::new();
        for port in ports {
            let configs_for_port: Vec<Arc<ServerConfig>> = config_list
                .iter()
                .filter(|s| s.ports.contains(&port) || (s.ports.is_empty() && port == config.port))
                .cloned()
                .collect();
            let configs_for_port = if configs_for_port.is_empty() {
                config_list.clone()
            } else {
                configs_for_port
            };

            let std_listener = bind_listener(port, config.open_linger)?;
            let listener = TcpListener::from_std(std_listener);
            reactor.add_fd(listener.as_raw_fd(), true, false)?;
            listeners.insert(listener.as_raw_fd(), (listener, configs_for_port));
        }

        let (tx, rx) = mpsc::channel();

        Ok(Server {
            reactor,
            timer: HeapTimer::new(),
            thread_pool: ThreadPool::new(config.thread_num.max(1)),
            db: Arc::new(db),
            timeout: if config.timeout_ms > 0 {
                Some(Duration::from_millis(config.timeout_ms))
            } else {
                None
            },
            edge_triggered_conn,
            edge_triggered_listen,
            listeners,
            connections: HashMap::new(),
            pending_close: Arc::new(std::sync::Mutex::new(Vec::new())),
            active_connections: Arc::new(AtomicUsize::new(0)),
            tx,
            rx,
        })
    }

    /// Runs the accept/dispatch loop forever. Only returns on a
    /// reactor-level I/O error (a fatal condition per spec.md §7).
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.tick()?;
        }
    }

    /// One iteration: drain worker completions and expired timers,
    /// wait for readiness, then dispatch.
    fn tick(&mut self) -> Result<(), ServerError> {
        self.drain_completions();
        self.drain_pending_close();

        let timeout_ms = self.timer.get_next_tick();
        self.reactor.wait(timeout_ms)?;

        let events: Vec<_> = self.reactor.events().collect();
        for (fd, flags) in events {
            if self.listeners.contains_key(&fd) {
                self.accept_loop(fd)?;
                continue;
            }

            if flags.is_problem() {
                self.close_connection(fd);
                continue;
            }

            if flags.readable {
                self.dispatch_read(fd);
            } else if flags.writable {
                self.dispatch_write(fd);
            }
        }
        Ok(())
    }

    fn accept_loop(&mut self, listen_fd: RawFd) -> Result<(), ServerError> {
        loop {
            let (listener, configs) = self.listeners.get(&listen_fd).expect("listener present");
            match listener.accept() {
                Ok((mut stream, _addr)) => {
                    if self.active_connections.load(Ordering::SeqCst) >= crate::config::MAX_FD {
                        let _ = stream.write_all(b"Server busy!");
                        continue;
                    }
                    let fd = stream.as_raw_fd();
                    self.reactor.add_fd(fd, true, false)?;
                    self.active_connections.fetch_add(1, Ordering::SeqCst);
                    if let Some(timeout) = self.timeout {
                        timeouts::arm(&mut self.timer, fd as usize, timeout, self.pending_close.clone());
                    }
                    let conn = HttpConnection::new(
                        stream,
                        configs.clone(),
                        self.db.clone(),
                        self.edge_triggered_conn,
                    );
                    self.connections.insert(fd, conn);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
            if !self.edge_triggered_listen {
                break;
            }
        }
        Ok(())
    }

    fn dispatch_read(&mut self, fd: RawFd) {
        let Some(mut conn) = self.connections.remove(&fd) else {
            return;
        };
        conn.touch();
        if let Some(timeout) = self.timeout {
            timeouts::extend(&mut self.timer, fd as usize, timeout);
        }
        let tx = self.tx.clone();
        self.thread_pool.add_task(move || on_read(conn, fd, tx));
    }

    fn dispatch_write(&mut self, fd: RawFd) {
        let Some(mut conn) = self.connections.remove(&fd) else {
            return;
        };
        conn.touch();
        if let Some(timeout) = self.timeout {
            timeouts::extend(&mut self.timer, fd as usize, timeout);
        }
        let tx = self.tx.clone();
        self.thread_pool.add_task(move || on_write(conn, fd, tx));
    }

    fn drain_completions(&mut self) {
        while let Ok((fd, conn, next)) = self.rx.try_recv() {
            match next {
                NextStep::Close => {
                    let _ = self.reactor.del_fd(fd);
                    self.active_connections.fetch_sub(1, Ordering::SeqCst);
                    drop(conn);
                }
                NextStep::ReadAgain => {
                    if self.reactor.mod_fd(fd, true, false).is_ok() {
                        self.connections.insert(fd, conn);
                    } else {
                        self.active_connections.fetch_sub(1, Ordering::SeqCst);
                    }
                }
                NextStep::WriteAgain => {
                    if self.reactor.mod_fd(fd, false, true).is_ok() {
                        self.connections.insert(fd, conn);
                    } else {
                        self.active_connections.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            }
        }
    }

    fn drain_pending_close(&mut self) {
        let expired: Vec<usize> = std::mem::take(&mut *self.pending_close.lock().unwrap());
        for fd in expired {
            self.close_connection(fd as RawFd);
        }
    }

    fn close_connection(&mut self, fd: RawFd) {
        let _ = self.reactor.del_fd(fd);
        if self.connections.remove(&fd).is_some() {
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Closes the listening sockets, drains and closes the DB pool,
    /// and shuts the logger down last so late close messages are
    /// still recorded (spec.md Design Notes §9).
    pub fn shutdown(self) {
        for fd in self.listeners.keys() {
            let _ = self.reactor.del_fd(*fd);
        }
        drop(self.listeners);
        self.db.close();
        self.thread_pool.shutdown();
        proxy_log::shutdown();
    }
}

fn on_read(mut conn: HttpConnection, fd: RawFd, tx: Sender<Completion>) {
    match conn.read() {
        ReadOutcome::Closed => {
            let _ = tx.send((fd, conn, NextStep::Close));
            return;
        }
        ReadOutcome::Progress => {}
    }
    on_process(conn, fd, tx);
}

fn on_process(mut conn: HttpConnection, fd: RawFd, tx: Sender<Completion>) {
    let got_request = conn.process();
    let next = if got_request {
        NextStep::WriteAgain
    } else {
        NextStep::ReadAgain
    };
    let _ = tx.send((fd, conn, next));
}

fn on_write(mut conn: HttpConnection, fd: RawFd, tx: Sender<Completion>) {
    let next = match conn.write() {
        WriteOutcome::Done => {
            if conn.is_keep_alive() {
                NextStep::ReadAgain
            } else {
                NextStep::Close
            }
        }
        WriteOutcome::WouldBlock => NextStep::WriteAgain,
        WriteOutcome::Closed => NextStep::Close,
    };
    let _ = tx.send((fd, conn, next));
}

/// Opens a non-blocking IPv4 listening socket with `SO_REUSEADDR` set
/// and `SO_LINGER` per `open_linger`, mirroring
/// `original_source/code/server/webserver.cpp`'s `InitSocket_`. IPv6
/// is out of scope, matching that source.
fn bind_listener(port: u16, open_linger: bool) -> io::Result<std::net::TcpListener> {
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));

    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let reuse: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &reuse as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        let e = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(e);
    }

    let linger = libc::linger {
        l_onoff: if open_linger { 1 } else { 0 },
        l_linger: 1,
    };
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &linger as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::linger>() as libc::socklen_t,
        );
    }

    let SocketAddr::V4(v4) = addr else {
        unreachable!()
    };
    let sockaddr = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: v4.port().to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(v4.ip().octets()),
        },
        sin_zero: [0; 8],
    };

    let rc = unsafe {
        libc::bind(
            fd,
            &sockaddr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        let e = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(e);
    }

    let rc = unsafe { libc::listen(fd, LISTEN_BACKLOG) };
    if rc < 0 {
        let e = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(e);
    }

    let listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
    listener.set_nonblocking(true)?;
    Ok(listener)
}
