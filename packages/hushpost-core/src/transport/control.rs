//! Control-port client for the onion daemon.
//!
//! Only the handful of commands the bootstrap loop needs: `PROTOCOLINFO`,
//! `AUTHENTICATE`, `GETINFO status/bootstrap-phase` and `QUIT`.
//!
//! ```text
//!  C: PROTOCOLINFO 1
//!  S: 250-PROTOCOLINFO 1
//!  S: 250-AUTH METHODS=NULL
//!  S: 250 OK
//!  C: AUTHENTICATE
//!  S: 250 OK
//!  C: GETINFO status/bootstrap-phase
//!  S: 250-status/bootstrap-phase=NOTICE BOOTSTRAP PROGRESS=100 TAG=done SUMMARY="Done"
//!  S: 250 OK
//! ```

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// Opens control connections
#[async_trait]
pub trait ControlConnector: Send + Sync {
    /// Connect to the control port at `addr`
    async fn connect(&self, addr: &str) -> Result<Box<dyn ControlChannel>>;
}

/// An open control connection
#[async_trait]
pub trait ControlChannel: Send {
    /// Authenticate with whatever method the daemon offers
    async fn authenticate(&mut self, password: Option<&str>) -> Result<()>;

    /// Current bootstrap phase
    async fn bootstrap_status(&mut self) -> Result<BootstrapStatus>;

    /// Say goodbye; errors are ignored
    async fn close(&mut self);
}

/// Authentication method for the control port
#[derive(Debug, Clone)]
pub enum ControlAuth {
    /// No authentication required
    Null,
    /// Cookie read from the given file
    Cookie(String),
    /// Plain password checked against the daemon's hashed password
    Password(String),
}

/// Information from a `PROTOCOLINFO` reply
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Offered authentication methods
    pub auth_methods: Vec<String>,
    /// Cookie file path for cookie authentication
    pub cookie_file: Option<String>,
}

impl ProtocolInfo {
    fn offers(&self, method: &str) -> bool {
        self.auth_methods.iter().any(|m| m == method)
    }
}

/// Parsed `status/bootstrap-phase`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapStatus {
    /// NOTICE, WARN or ERR
    pub severity: String,
    /// 0..=100
    pub progress: u8,
    /// Phase tag, `done` when finished
    pub tag: String,
    /// Human-readable phase description
    pub summary: Option<String>,
}

impl BootstrapStatus {
    /// Circuit is fully established
    pub fn is_done(&self) -> bool {
        self.progress >= 100 || self.tag == "done"
    }

    /// Daemon reported an error severity
    pub fn is_error(&self) -> bool {
        self.severity == "ERR"
    }
}

// ============================================================================
// PARSERS
// ============================================================================

/// One line of a control reply
#[derive(Debug, PartialEq, Eq)]
enum ReplyLine<'a> {
    /// `250-...` more lines follow
    Mid(&'a str),
    /// `250+...` a data block follows, terminated by `.`
    Data(&'a str),
    /// `250 ...` final line
    End(&'a str),
    /// 4xx/5xx
    Error(&'a str),
}

fn parse_reply_line(line: &str) -> Result<ReplyLine<'_>> {
    if line.len() < 4 || !line.is_char_boundary(3) || !line.is_char_boundary(4) {
        return Err(Error::Io(format!("malformed control reply: {:?}", line)));
    }
    let (code, rest) = line.split_at(3);
    let body = &rest[1..];
    if !code.starts_with('2') {
        return Ok(ReplyLine::Error(line));
    }
    match rest.as_bytes()[0] {
        b'-' => Ok(ReplyLine::Mid(body)),
        b'+' => Ok(ReplyLine::Data(body)),
        b' ' => Ok(ReplyLine::End(body)),
        _ => Err(Error::Io(format!("malformed control reply: {:?}", line))),
    }
}

fn parse_protocol_info(lines: &[String]) -> ProtocolInfo {
    let mut info = ProtocolInfo::default();
    for line in lines {
        // AUTH METHODS=COOKIE,SAFECOOKIE COOKIEFILE="/path"
        let Some(auth) = line.strip_prefix("AUTH ") else {
            continue;
        };
        if let Some(start) = auth.find("METHODS=") {
            let after = &auth[start + 8..];
            let end = after.find(' ').unwrap_or(after.len());
            info.auth_methods = after[..end].split(',').map(String::from).collect();
        }
        if let Some(start) = auth.find("COOKIEFILE=\"") {
            let after = &auth[start + 12..];
            if let Some(end) = after.find('"') {
                info.cookie_file = Some(unescape_quoted(&after[..end]));
            }
        }
    }
    info
}

/// Parse `status/bootstrap-phase=NOTICE BOOTSTRAP PROGRESS=.. TAG=.. SUMMARY=".."`
pub fn parse_bootstrap_phase(line: &str) -> Option<BootstrapStatus> {
    let value = line.strip_prefix("status/bootstrap-phase=")?;
    let mut words = value.split_whitespace();
    let severity = words.next()?.to_string();
    if words.next()? != "BOOTSTRAP" {
        return None;
    }

    let mut progress = None;
    let mut tag = None;
    for word in words {
        if let Some(p) = word.strip_prefix("PROGRESS=") {
            progress = p.parse::<u8>().ok();
        } else if let Some(t) = word.strip_prefix("TAG=") {
            tag = Some(t.to_string());
        }
    }
    let summary = value.find("SUMMARY=\"").and_then(|start| {
        let after = &value[start + 9..];
        after.find('"').map(|end| after[..end].to_string())
    });

    Some(BootstrapStatus {
        severity,
        progress: progress?,
        tag: tag.unwrap_or_default(),
        summary,
    })
}

fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape_quoted(s: &str) -> String {
    s.replace("\\\"", "\"").replace("\\\\", "\\")
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Control-port client over any byte stream
pub struct TorController<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    authenticated: bool,
}

impl TorController<TcpStream> {
    /// Connect to a control port
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Io(format!("failed to connect to control port: {}", e)))?;
        Ok(Self::new(stream))
    }
}

impl<S> TorController<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Wrap an already-connected stream
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            authenticated: false,
        }
    }

    /// Whether `AUTHENTICATE` has succeeded
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Io(format!("failed to read response: {}", e)))?;
        if n == 0 {
            return Err(Error::Io("control connection closed".into()));
        }
        Ok(line.trim_end().to_string())
    }

    /// Send a command; `Ok(Err(line))` is a rejection by the daemon
    async fn command(&mut self, cmd: &str) -> Result<std::result::Result<Vec<String>, String>> {
        self.writer
            .write_all(format!("{}\r\n", cmd).as_bytes())
            .await
            .map_err(|e| Error::Io(format!("failed to send command: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::Io(format!("failed to flush: {}", e)))?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }
            match parse_reply_line(&line)? {
                ReplyLine::Mid(body) => lines.push(body.to_string()),
                ReplyLine::Data(body) => {
                    lines.push(body.to_string());
                    loop {
                        let data = self.read_line().await?;
                        if data == "." {
                            break;
                        }
                    }
                }
                ReplyLine::End(body) => {
                    lines.push(body.to_string());
                    return Ok(Ok(lines));
                }
                ReplyLine::Error(full) => return Ok(Err(full.to_string())),
            }
        }
    }

    /// Ask which authentication methods are offered
    pub async fn protocol_info(&mut self) -> Result<ProtocolInfo> {
        let lines = self
            .command("PROTOCOLINFO 1")
            .await?
            .map_err(|line| Error::ControlAuthFailed(format!("PROTOCOLINFO rejected: {}", line)))?;
        Ok(parse_protocol_info(&lines))
    }

    /// Authenticate with a specific method
    pub async fn authenticate_with(&mut self, auth: ControlAuth) -> Result<()> {
        let cmd = match auth {
            ControlAuth::Null => "AUTHENTICATE".to_string(),
            ControlAuth::Cookie(path) => {
                let cookie = tokio::fs::read(&path).await.map_err(|e| {
                    Error::ControlAuthFailed(format!("failed to read cookie file: {}", e))
                })?;
                format!("AUTHENTICATE {}", hex::encode(cookie))
            }
            ControlAuth::Password(password) => {
                format!("AUTHENTICATE \"{}\"", escape_quoted(&password))
            }
        };

        self.command(&cmd)
            .await?
            .map_err(Error::ControlAuthFailed)?;
        self.authenticated = true;

        tracing::debug!("Authenticated with control port");
        Ok(())
    }

    /// Pick a method from `PROTOCOLINFO` and authenticate
    pub async fn authenticate_auto(&mut self, password: Option<&str>) -> Result<()> {
        let info = self.protocol_info().await?;
        tracing::debug!(methods = ?info.auth_methods, "Control port auth methods");

        if info.offers("NULL") {
            return self.authenticate_with(ControlAuth::Null).await;
        }
        if info.offers("HASHEDPASSWORD") {
            if let Some(password) = password {
                return self
                    .authenticate_with(ControlAuth::Password(password.to_string()))
                    .await;
            }
        }
        if info.offers("COOKIE") || info.offers("SAFECOOKIE") {
            if let Some(path) = info.cookie_file.clone() {
                return self.authenticate_with(ControlAuth::Cookie(path)).await;
            }
        }

        Err(Error::ControlAuthFailed(format!(
            "no usable authentication method (offered: {})",
            info.auth_methods.join(",")
        )))
    }

    /// Query the bootstrap phase
    pub async fn bootstrap_phase(&mut self) -> Result<BootstrapStatus> {
        if !self.authenticated {
            return Err(Error::ControlAuthFailed("not authenticated".into()));
        }
        let lines = self
            .command("GETINFO status/bootstrap-phase")
            .await?
            .map_err(Error::BootstrapFailed)?;
        lines
            .iter()
            .find_map(|line| parse_bootstrap_phase(line))
            .ok_or_else(|| Error::BootstrapFailed("no bootstrap phase in reply".into()))
    }

    /// Send `QUIT`
    pub async fn quit(&mut self) {
        if let Err(e) = self.command("QUIT").await {
            tracing::debug!("QUIT failed: {}", e);
        }
        let _ = self.writer.shutdown().await;
    }
}

#[async_trait]
impl<S> ControlChannel for TorController<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn authenticate(&mut self, password: Option<&str>) -> Result<()> {
        self.authenticate_auto(password).await
    }

    async fn bootstrap_status(&mut self) -> Result<BootstrapStatus> {
        self.bootstrap_phase().await
    }

    async fn close(&mut self) {
        self.quit().await
    }
}

/// Connects over TCP to the local control port
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpControlConnector;

#[async_trait]
impl ControlConnector for TcpControlConnector {
    async fn connect(&self, addr: &str) -> Result<Box<dyn ControlChannel>> {
        Ok(Box::new(TorController::connect(addr).await?))
    }
}
