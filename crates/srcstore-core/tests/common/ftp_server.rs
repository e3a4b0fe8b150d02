//! Minimal passive-mode FTP server for integration tests.
//!
//! Accepts any login, answers `LIST` with a fixed set of lines and `RETR`
//! with a fixed body. Every command is recorded so tests can check that the
//! client always sent `QUIT`.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

pub struct FtpServer {
    pub port: u16,
    commands: Arc<Mutex<Vec<String>>>,
}

impl FtpServer {
    /// `ftp://anonymous@127.0.0.1:<port>/<path>`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "ftp://anonymous@127.0.0.1:{}/{}",
            self.port,
            path.trim_start_matches('/')
        )
    }

    /// Command verbs received so far, e.g. `["USER", "PASS", "TYPE", ...]`.
    pub fn verbs(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. `listing` lines are returned for
/// any LIST, `body` for any RETR. The server runs until the process exits.
pub fn start(listing: Vec<String>, body: Vec<u8>) -> FtpServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let commands = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&commands);
    let listing = Arc::new(listing);
    let body = Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let log = Arc::clone(&log);
            let listing = Arc::clone(&listing);
            let body = Arc::clone(&body);
            thread::spawn(move || {
                let _ = handle(stream, &listing, &body, &log);
            });
        }
    });
    FtpServer { port, commands }
}

/// A listing line in `ls -l` format for `name` of `size` bytes.
pub fn ls_line(name: &str, size: u64) -> String {
    format!(
        "-rw-r--r--    1 0        0        {:>8} Jan 01  2020 {}",
        size, name
    )
}

fn handle(
    stream: TcpStream,
    listing: &[String],
    body: &[u8],
    log: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(std::time::Duration::from_secs(5)))?;
    let mut out = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    out.write_all(b"220 test server ready\r\n")?;

    let mut data: Option<TcpListener> = None;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let verb = line
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        log.lock().unwrap().push(verb.clone());

        match verb.as_str() {
            "USER" => out.write_all(b"331 password please\r\n")?,
            "PASS" => out.write_all(b"230 logged in\r\n")?,
            "TYPE" => out.write_all(b"200 type set\r\n")?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0")?;
                let port = listener.local_addr()?.port();
                data = Some(listener);
                let reply = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                    port / 256,
                    port % 256
                );
                out.write_all(reply.as_bytes())?;
            }
            "LIST" | "RETR" => {
                let Some(listener) = data.take() else {
                    out.write_all(b"425 use PASV first\r\n")?;
                    continue;
                };
                out.write_all(b"150 opening data connection\r\n")?;
                let (mut conn, _) = listener.accept()?;
                if verb == "LIST" {
                    for entry in listing {
                        conn.write_all(entry.as_bytes())?;
                        conn.write_all(b"\r\n")?;
                    }
                } else {
                    conn.write_all(body)?;
                }
                drop(conn);
                out.write_all(b"226 transfer complete\r\n")?;
            }
            "QUIT" => {
                out.write_all(b"221 bye\r\n")?;
                return Ok(());
            }
            _ => out.write_all(b"502 not implemented\r\n")?,
        }
    }
}
