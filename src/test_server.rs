//! A scripted HTTP/1.1 server on localhost for exercising the transports.
use std::{
    collections::VecDeque,
    io::{BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    sync::{Arc, Mutex},
};

/// A features payload with one active feature, `NEW_CHECKOUT`, rolled out to everybody.
pub(crate) const FEATURES_BODY: &str = r#"{"data":{"features":[{"id":"0f7b8a51","key":"NEW_CHECKOUT","active":true,"segments":[{"segmentType":"everyoneElse","percentage":100,"userConstraints":[]}]}]}}"#;

/// One canned response.
pub(crate) struct Reply {
    raw: String,
    /// Keep the connection open after writing, until the client hangs up.
    keep_open: bool,
}

impl Reply {
    pub fn status(status: u16, headers: &[(&str, &str)], body: &str) -> Reply {
        let reason = match status {
            200 => "OK",
            304 => "Not Modified",
            401 => "Unauthorized",
            403 => "Forbidden",
            500 => "Internal Server Error",
            _ => "Unknown",
        };
        let mut raw = format!(
            "HTTP/1.1 {status} {reason}\r\ncontent-length: {}\r\n",
            body.len()
        );
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        raw.push_str("\r\n");
        raw.push_str(body);
        Reply {
            raw,
            keep_open: false,
        }
    }

    /// An event stream sending each of `events` as one `data:` frame, then going quiet.
    pub fn event_stream(events: &[&str]) -> Reply {
        let mut raw = "HTTP/1.1 200 OK\r\n\
                       content-type: text/event-stream\r\n\
                       transfer-encoding: chunked\r\n\r\n"
            .to_owned();
        for event in events {
            let frame = format!("data: {event}\n\n");
            raw.push_str(&format!("{:x}\r\n{frame}\r\n", frame.len()));
        }
        Reply {
            raw,
            keep_open: true,
        }
    }
}

/// Serves queued replies in order, one per request, across connections. Once the queue is
/// empty, connections are closed without a response.
pub(crate) struct TestServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn start(replies: impl IntoIterator<Item = Reply>) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        let replies = Arc::new(Mutex::new(replies.into_iter().collect::<VecDeque<_>>()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        {
            let requests = requests.clone();
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else {
                        return;
                    };
                    let replies = replies.clone();
                    let requests = requests.clone();
                    std::thread::spawn(move || serve(stream, &replies, &requests));
                }
            });
        }

        TestServer { base_url, requests }
    }

    /// Heads of the requests received so far, lowercased.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve(stream: TcpStream, replies: &Mutex<VecDeque<Reply>>, requests: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    loop {
        let mut head = String::new();
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            if line == "\r\n" {
                break;
            }
            head.push_str(&line);
        }
        requests.lock().unwrap().push(head.to_lowercase());

        let Some(reply) = replies.lock().unwrap().pop_front() else {
            return;
        };
        if writer.write_all(reply.raw.as_bytes()).is_err() {
            return;
        }
        if reply.keep_open {
            let _ = reader.read_to_end(&mut Vec::new());
            return;
        }
    }
}
