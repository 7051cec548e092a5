#![allow(dead_code)]

//! Scripted DNS server for integration tests, listening on UDP and TCP at
//! the same address.
//!
//! Behaviors are consumed from one queue in arrival order regardless of
//! transport; when the queue is empty the default behavior answers.
//! `Ignore` produces a timeout on the client side: a UDP query gets no
//! datagram back, a TCP query gets an open connection that never answers.

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{DNSClass, RData, Record, RecordType};
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// NOERROR with the subset of these addresses matching the query type.
    Answer(Vec<IpAddr>),
    /// NOERROR with the TC bit set; the caller should retry via TCP.
    Truncated(Vec<IpAddr>),
    ServFail,
    NxDomain,
    /// NOERROR with an empty answer section.
    Empty,
    /// Swallow the query; the client times out.
    Ignore,
}

struct MockState {
    script: Mutex<VecDeque<MockBehavior>>,
    default: Mutex<MockBehavior>,
    queries_received: AtomicUsize,
    query_types: Mutex<Vec<RecordType>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    response_delay: Mutex<Duration>,
}

impl MockState {
    fn next_behavior(&self) -> MockBehavior {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.lock().unwrap().clone())
    }
}

pub struct MockDnsServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockDnsServer {
    pub async fn start() -> (Self, SocketAddr) {
        Self::start_with_default(MockBehavior::Answer(vec!["192.0.2.1".parse().unwrap()])).await
    }

    pub async fn start_with_default(default: MockBehavior) -> (Self, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = socket.local_addr().expect("mock server addr");
        let listener = TcpListener::bind(addr)
            .await
            .expect("bind mock TCP listener");
        let socket = Arc::new(socket);

        let state = Arc::new(MockState {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            queries_received: AtomicUsize::new(0),
            query_types: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            response_delay: Mutex::new(Duration::ZERO),
        });

        let shutdown = CancellationToken::new();

        let udp_state = Arc::clone(&state);
        let udp_socket = Arc::clone(&socket);
        let udp_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = udp_shutdown.cancelled() => break,
                    result = udp_socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { break };
                        let query = buf[..len].to_vec();
                        let behavior = udp_state.next_behavior();
                        let task_state = Arc::clone(&udp_state);
                        let task_socket = Arc::clone(&udp_socket);
                        tokio::spawn(async move {
                            if let Some(response) = process_query(&task_state, &query, behavior).await {
                                let _ = task_socket.send_to(&response, peer).await;
                            }
                        });
                    }
                }
            }
        });

        let tcp_state = Arc::clone(&state);
        let tcp_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tcp_shutdown.cancelled() => break,
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        let conn_state = Arc::clone(&tcp_state);
                        let conn_shutdown = tcp_shutdown.clone();
                        tokio::spawn(async move {
                            handle_tcp_connection(conn_state, stream, conn_shutdown).await;
                        });
                    }
                }
            }
        });

        (
            Self {
                addr,
                state,
                shutdown,
            },
            addr,
        )
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue behaviors consumed one per incoming query.
    pub fn script(&self, behaviors: Vec<MockBehavior>) {
        self.state.script.lock().unwrap().extend(behaviors);
    }

    pub fn set_default(&self, behavior: MockBehavior) {
        *self.state.default.lock().unwrap() = behavior;
    }

    /// Delay before each response; lets tests observe concurrency.
    pub fn set_response_delay(&self, delay: Duration) {
        *self.state.response_delay.lock().unwrap() = delay;
    }

    pub fn queries_received(&self) -> usize {
        self.state.queries_received.load(Ordering::SeqCst)
    }

    pub fn query_types(&self) -> Vec<RecordType> {
        self.state.query_types.lock().unwrap().clone()
    }

    /// High-water mark of simultaneously pending queries.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn shutdown(self) {
        self.shutdown.cancel();
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_tcp_connection(
    state: Arc<MockState>,
    mut stream: TcpStream,
    shutdown: CancellationToken,
) {
    let mut len_buf = [0u8; 2];
    if stream.read_exact(&mut len_buf).await.is_err() {
        return;
    }
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut query = vec![0u8; len];
    if stream.read_exact(&mut query).await.is_err() {
        return;
    }

    let behavior = state.next_behavior();
    match process_query(&state, &query, behavior).await {
        Some(response) => {
            let _ = stream
                .write_all(&(response.len() as u16).to_be_bytes())
                .await;
            let _ = stream.write_all(&response).await;
            let _ = stream.flush().await;
        }
        None => {
            // Hold the connection open so the client runs into its own
            // deadline instead of seeing a reset.
            shutdown.cancelled().await;
        }
    }
}

async fn process_query(
    state: &Arc<MockState>,
    query: &[u8],
    behavior: MockBehavior,
) -> Option<Vec<u8>> {
    state.queries_received.fetch_add(1, Ordering::SeqCst);
    let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(current, Ordering::SeqCst);

    let delay = *state.response_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let response = match Message::from_vec(query) {
        Ok(parsed) => {
            if let Some(question) = parsed.queries().first() {
                state.query_types.lock().unwrap().push(question.query_type());
            }
            build_response(&parsed, &behavior)
        }
        Err(_) => None,
    };

    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

fn build_response(query: &Message, behavior: &MockBehavior) -> Option<Vec<u8>> {
    let question = query.queries().first()?;

    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(true);
    response.set_recursion_available(true);
    response.add_query(question.clone());

    match behavior {
        MockBehavior::Ignore => return None,
        MockBehavior::ServFail => {
            response.set_response_code(ResponseCode::ServFail);
        }
        MockBehavior::NxDomain => {
            response.set_response_code(ResponseCode::NXDomain);
        }
        MockBehavior::Empty => {}
        MockBehavior::Truncated(addresses) => {
            response.set_truncated(true);
            add_answers(&mut response, question, addresses);
        }
        MockBehavior::Answer(addresses) => {
            add_answers(&mut response, question, addresses);
        }
    }

    response.to_vec().ok()
}

fn add_answers(
    response: &mut Message,
    question: &hickory_proto::op::Query,
    addresses: &[IpAddr],
) {
    for address in addresses {
        let rdata = match (address, question.query_type()) {
            (IpAddr::V4(v4), RecordType::A) => RData::A(A::from(*v4)),
            (IpAddr::V6(v6), RecordType::AAAA) => RData::AAAA(AAAA::from(*v6)),
            _ => continue,
        };
        let mut record = Record::from_rdata(question.name().clone(), 60, rdata);
        record.set_dns_class(DNSClass::IN);
        response.add_answer(record);
    }
}
