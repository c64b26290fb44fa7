//! Minimal blocking IMAP4rev1 client over TLS.
//!
//! Only the commands the responder needs: LOGIN, SELECT, UID SEARCH UNSEEN,
//! UID FETCH BODY.PEEK[], UID STORE +FLAGS (\Seen), CLOSE, LOGOUT. Messages are
//! addressed by UID so an EXPUNGE from another client mid-cycle cannot shift
//! a handle onto a different message. The protocol engine is generic over any
//! `Read + Write` stream; `connect_tls` wires it to rustls.
//! Blocking; run it in `spawn_blocking`.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::channels::email_types::MessageHandle;
use crate::error::MailboxError;

/// Socket read/write timeout for the IMAP connection.
const IO_TIMEOUT: Duration = Duration::from_secs(30);

pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// One untagged or tagged response line, plus any literal that followed it.
#[derive(Debug, Default)]
struct ResponseLine {
    text: String,
    literal: Option<Vec<u8>>,
}

/// An authenticated IMAP session.
pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    tag_counter: u32,
}

/// Open a TLS connection to `host:port` and read the server greeting.
pub fn connect_tls(host: &str, port: u16) -> Result<ImapSession<TlsStream>, MailboxError> {
    let connect_err = |reason: String| MailboxError::Connect {
        host: format!("{host}:{port}"),
        reason,
    };

    let tcp = TcpStream::connect((host, port)).map_err(|e| connect_err(e.to_string()))?;
    tcp.set_read_timeout(Some(IO_TIMEOUT))?;
    tcp.set_write_timeout(Some(IO_TIMEOUT))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| connect_err(format!("invalid server name: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| connect_err(format!("TLS setup failed: {e}")))?;

    ImapSession::from_stream(rustls::StreamOwned::new(conn, tcp))
        .map_err(|e| connect_err(format!("no greeting: {e}")))
}

impl<S: Read + Write> ImapSession<S> {
    /// Wrap a connected stream and consume the `* OK` greeting.
    pub fn from_stream(stream: S) -> Result<Self, MailboxError> {
        let mut session = Self {
            stream: BufReader::new(stream),
            tag_counter: 0,
        };
        let greeting = session.read_line()?;
        if !greeting.text.starts_with("* OK") && !greeting.text.starts_with("* PREAUTH") {
            return Err(MailboxError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.text.trim_end()
            )));
        }
        Ok(session)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), MailboxError> {
        let cmd = format!("LOGIN {} {}", quote(username), quote(password));
        self.command(&cmd).map(|_| ())
    }

    pub fn select_inbox(&mut self) -> Result<(), MailboxError> {
        self.command("SELECT INBOX")
            .map(|_| ())
            .map_err(|e| MailboxError::Query(format!("SELECT INBOX failed: {e}")))
    }

    /// `UID SEARCH UNSEEN`, UIDs in server order.
    pub fn search_unseen(&mut self) -> Result<Vec<MessageHandle>, MailboxError> {
        let lines = self
            .command("UID SEARCH UNSEEN")
            .map_err(|e| MailboxError::Query(format!("UID SEARCH UNSEEN failed: {e}")))?;

        let mut handles = Vec::new();
        for line in &lines {
            if let Some(rest) = line.text.strip_prefix("* SEARCH") {
                handles.extend(rest.split_whitespace().map(MessageHandle::new));
            }
        }
        Ok(handles)
    }

    /// Fetch the full raw message without setting `\Seen`.
    pub fn fetch_raw(&mut self, handle: &MessageHandle) -> Result<Vec<u8>, MailboxError> {
        let parse_err = |reason: String| MailboxError::Parse {
            handle: handle.to_string(),
            reason,
        };

        let lines = self
            .command(&format!("UID FETCH {handle} BODY.PEEK[]"))
            .map_err(|e| parse_err(e.to_string()))?;

        // Unsolicited FETCH lines (flag changes on other messages) may be
        // interleaved; only the one carrying our UID and a literal counts.
        lines
            .into_iter()
            .find_map(|l| {
                let ours = is_fetch(&l.text) && fetch_uid(&l.text) == Some(handle.as_str());
                if ours { l.literal } else { None }
            })
            .ok_or_else(|| parse_err("no message body in FETCH response".into()))
    }

    pub fn mark_seen(&mut self, handle: &MessageHandle) -> Result<(), MailboxError> {
        self.command(&format!("UID STORE {handle} +FLAGS (\\Seen)"))
            .map(|_| ())
            .map_err(|e| MailboxError::Flag {
                handle: handle.to_string(),
                reason: e.to_string(),
            })
    }

    /// `CLOSE` then `LOGOUT`. Both are attempted; the first error is returned.
    pub fn close(&mut self) -> Result<(), MailboxError> {
        let closed = self.command("CLOSE").map(|_| ());
        let logged_out = self.command("LOGOUT").map(|_| ());
        closed.and(logged_out)
    }

    // ── Protocol plumbing ───────────────────────────────────────

    fn next_tag(&mut self) -> String {
        self.tag_counter += 1;
        format!("A{}", self.tag_counter)
    }

    /// Send a tagged command and collect responses up to its completion.
    /// A `NO`/`BAD` completion is a `Protocol` error.
    fn command(&mut self, cmd: &str) -> Result<Vec<ResponseLine>, MailboxError> {
        let tag = self.next_tag();
        let writer = self.stream.get_mut();
        writer.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        writer.flush()?;

        let tagged = format!("{tag} ");
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if let Some(status) = line.text.strip_prefix(&tagged) {
                if status.starts_with("OK") {
                    return Ok(lines);
                }
                return Err(MailboxError::Protocol(status.trim_end().to_string()));
            }
            lines.push(line);
        }
    }

    /// Read one response line; if it announces a `{n}` literal, read the
    /// literal and the remainder of the line too.
    fn read_line(&mut self) -> Result<ResponseLine, MailboxError> {
        let mut response = ResponseLine::default();
        loop {
            let mut buf = Vec::new();
            let n = self.stream.read_until(b'\n', &mut buf)?;
            if n == 0 {
                return Err(MailboxError::Protocol("IMAP connection closed".into()));
            }
            let chunk = String::from_utf8_lossy(&buf);
            let chunk = chunk.trim_end_matches(['\r', '\n']);
            response.text.push_str(chunk);

            match literal_len(chunk) {
                Some(len) => {
                    let mut literal = vec![0u8; len];
                    self.stream.read_exact(&mut literal)?;
                    response.literal = Some(literal);
                }
                None => return Ok(response),
            }
        }
    }
}

/// `* <n> FETCH ...`
fn is_fetch(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    tokens.next() == Some("*")
        && tokens.next().is_some_and(|n| n.bytes().all(|b| b.is_ascii_digit()))
        && tokens.next().is_some_and(|t| t.eq_ignore_ascii_case("FETCH"))
}

/// Value of the `UID` data item in a FETCH response line.
fn fetch_uid(line: &str) -> Option<&str> {
    let mut tokens = line
        .split_whitespace()
        .map(|t| t.trim_matches(|c| c == '(' || c == ')'));
    tokens.find(|t| t.eq_ignore_ascii_case("UID"))?;
    tokens.next().filter(|uid| !uid.is_empty())
}

/// Octet count of a trailing `{n}` literal marker.
fn literal_len(line: &str) -> Option<usize> {
    let open = line.strip_suffix('}')?.rfind('{')?;
    line[open + 1..line.len() - 1].parse().ok()
}

/// Quote a string for use as an IMAP `quoted` argument.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use super::*;

    /// In-memory IMAP server: replays a canned transcript, records commands.
    pub(crate) struct ScriptedStream {
        input: Cursor<Vec<u8>>,
        pub written: Vec<u8>,
    }

    impl ScriptedStream {
        pub(crate) fn new(transcript: &[u8]) -> Self {
            Self {
                input: Cursor::new(transcript.to_vec()),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session(transcript: &str) -> ImapSession<ScriptedStream> {
        ImapSession::from_stream(ScriptedStream::new(transcript.as_bytes())).unwrap()
    }

    fn written(session: ImapSession<ScriptedStream>) -> String {
        String::from_utf8(session.stream.into_inner().written).unwrap()
    }

    #[test]
    fn login_quotes_credentials() {
        let mut s = session("* OK ready\r\nA1 OK LOGIN completed\r\n");
        s.login("desk@bank.test", "pa\"ss").unwrap();
        assert_eq!(written(s), "A1 LOGIN \"desk@bank.test\" \"pa\\\"ss\"\r\n");
    }

    #[test]
    fn login_rejected_carries_server_status() {
        let mut s = session("* OK ready\r\nA1 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n");
        let err = s.login("u", "p").unwrap_err();
        assert!(matches!(
            err,
            MailboxError::Protocol(ref status) if status.contains("AUTHENTICATIONFAILED")
        ));
    }

    #[test]
    fn bad_greeting_rejected() {
        let result = ImapSession::from_stream(ScriptedStream::new(b"* BYE go away\r\n"));
        assert!(matches!(result, Err(MailboxError::Protocol(_))));
    }

    #[test]
    fn search_unseen_returns_handles_in_order() {
        let mut s = session(
            "* OK ready\r\n\
             * SEARCH 4 7 12\r\n\
             A1 OK SEARCH completed\r\n",
        );
        let handles = s.search_unseen().unwrap();
        assert_eq!(
            handles,
            vec![
                MessageHandle::new("4"),
                MessageHandle::new("7"),
                MessageHandle::new("12")
            ]
        );
    }

    #[test]
    fn search_unseen_empty() {
        let mut s = session("* OK ready\r\n* SEARCH\r\nA1 OK SEARCH completed\r\n");
        assert!(s.search_unseen().unwrap().is_empty());
    }

    #[test]
    fn search_failure_is_query_error() {
        let mut s = session("* OK ready\r\nA1 BAD no mailbox selected\r\n");
        assert!(matches!(s.search_unseen(), Err(MailboxError::Query(_))));
    }

    #[test]
    fn fetch_reads_literal_by_length() {
        let body = "From: alice@example.com\r\nSubject: Hi\r\n\r\nA1 OK looks like a tag\r\n";
        let transcript = format!(
            "* OK ready\r\n\
             * 3 FETCH (UID 41 BODY[] {{{}}}\r\n{})\r\n\
             A1 OK FETCH completed\r\n",
            body.len(),
            body
        );
        let mut s = session(&transcript);
        let raw = s.fetch_raw(&MessageHandle::new("41")).unwrap();
        assert_eq!(raw, body.as_bytes());
        assert_eq!(written(s), "A1 UID FETCH 41 BODY.PEEK[]\r\n");
    }

    #[test]
    fn fetch_skips_unsolicited_flag_update() {
        let body = "From: bob@example.com\r\n\r\nLoan rates?\r\n";
        let transcript = format!(
            "* OK ready\r\n\
             * 2 FETCH (FLAGS (\\Seen))\r\n\
             * 3 FETCH (BODY[] {{{}}}\r\n{} UID 9)\r\n\
             A1 OK FETCH completed\r\n",
            body.len(),
            body
        );
        let mut s = session(&transcript);
        let raw = s.fetch_raw(&MessageHandle::new("9")).unwrap();
        assert_eq!(raw, body.as_bytes());
    }

    #[test]
    fn fetch_ignores_literal_for_other_uid() {
        let transcript = "* OK ready\r\n\
             * 1 FETCH (UID 8 BODY[] {4}\r\nnope)\r\n\
             A1 OK FETCH completed\r\n";
        let mut s = session(transcript);
        let err = s.fetch_raw(&MessageHandle::new("9")).unwrap_err();
        assert!(matches!(err, MailboxError::Parse { ref handle, .. } if handle == "9"));
    }

    #[test]
    fn fetch_without_literal_is_parse_error() {
        let mut s = session("* OK ready\r\nA1 OK FETCH completed\r\n");
        let err = s.fetch_raw(&MessageHandle::new("3")).unwrap_err();
        assert!(matches!(err, MailboxError::Parse { ref handle, .. } if handle == "3"));
    }

    #[test]
    fn mark_seen_sends_uid_store() {
        let mut s = session(
            "* OK ready\r\n* 5 FETCH (UID 12 FLAGS (\\Seen))\r\nA1 OK STORE completed\r\n",
        );
        s.mark_seen(&MessageHandle::new("12")).unwrap();
        assert_eq!(written(s), "A1 UID STORE 12 +FLAGS (\\Seen)\r\n");
    }

    #[test]
    fn handles_survive_expunge_between_stores() {
        // Another client expunges a message while UID 4 is being flagged;
        // UID 7 still names the same message afterwards.
        let mut s = session(
            "* OK ready\r\n\
             * SEARCH 4 7\r\n\
             A1 OK SEARCH completed\r\n\
             * 3 EXPUNGE\r\n\
             * 3 FETCH (UID 4 FLAGS (\\Seen))\r\n\
             A2 OK STORE completed\r\n\
             * 5 FETCH (UID 7 FLAGS (\\Seen))\r\n\
             A3 OK STORE completed\r\n",
        );
        let handles = s.search_unseen().unwrap();
        for handle in &handles {
            s.mark_seen(handle).unwrap();
        }
        assert_eq!(
            written(s),
            "A1 UID SEARCH UNSEEN\r\n\
             A2 UID STORE 4 +FLAGS (\\Seen)\r\n\
             A3 UID STORE 7 +FLAGS (\\Seen)\r\n"
        );
    }

    #[test]
    fn mark_seen_failure_is_flag_error() {
        let mut s = session("* OK ready\r\nA1 NO read-only mailbox\r\n");
        let err = s.mark_seen(&MessageHandle::new("5")).unwrap_err();
        assert!(matches!(err, MailboxError::Flag { .. }));
    }

    #[test]
    fn close_attempts_logout_even_if_close_fails() {
        let mut s = session(
            "* OK ready\r\n\
             A1 BAD no mailbox selected\r\n\
             * BYE logging out\r\n\
             A2 OK LOGOUT completed\r\n",
        );
        assert!(s.close().is_err());
        assert_eq!(written(s), "A1 CLOSE\r\nA2 LOGOUT\r\n");
    }

    #[test]
    fn connection_closed_mid_response() {
        let mut s = session("* OK ready\r\n* SEARCH 1\r\n");
        assert!(s.search_unseen().is_err());
    }

    #[test]
    fn fetch_uid_reads_item_anywhere_in_line() {
        assert_eq!(fetch_uid("* 3 FETCH (UID 41 BODY[] {10})"), Some("41"));
        assert_eq!(fetch_uid("* 3 FETCH (BODY[] {10} UID 9)"), Some("9"));
        assert_eq!(fetch_uid("* 2 FETCH (FLAGS (\\Seen))"), None);
        assert!(is_fetch("* 2 FETCH (FLAGS ())"));
        assert!(!is_fetch("* SEARCH 2"));
        assert!(!is_fetch("* 3 EXPUNGE"));
    }

    #[test]
    fn literal_len_parsing() {
        assert_eq!(literal_len("* 1 FETCH (BODY[] {342}"), Some(342));
        assert_eq!(literal_len("* 1 FETCH (FLAGS (\\Seen))"), None);
        assert_eq!(literal_len("{abc}"), None);
    }
}
