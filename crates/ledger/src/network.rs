//! Blocking peer transport for chain synchronization
//!
//! One framed request/response protocol serves all three concerns the
//! substrate needs from a peer: head lookup, block fetch, and head
//! announcement. Announcement is a short dialogue: the receiver
//! answers `Need` for every unknown predecessor until it can link the
//! announced block, then `Accepted`. Frames are length-prefixed
//! bincode.

use crate::block::Block;
use crate::error::{Error, Result};
use crate::node::Node;
use amber_core::Blake3Hash;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default port peers listen on
pub const DEFAULT_PORT: u16 = 18232;

/// Frames larger than this are rejected outright. Bounded by the 8 MiB
/// record payload cap plus generous block overhead.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
enum Request {
    Head { chain: String },
    Block { chain: String, hash: Blake3Hash },
    Announce { chain: String, hash: Blake3Hash, block: Block },
}

#[derive(Debug, Serialize, Deserialize)]
enum Response {
    Head { hash: Option<Blake3Hash> },
    Block { block: Option<Block> },
    Need { hash: Blake3Hash },
    Accepted,
    Rejected { reason: String },
}

/// Peer access as the chain layer sees it
pub trait Network: Send + Sync {
    /// Ask peers for the chain head; `None` when no peer knows the chain
    fn fetch_head(&self, chain: &str) -> Result<Option<Blake3Hash>>;
    /// Fetch one block by hash from any peer that has it
    fn fetch_block(&self, chain: &str, hash: &Blake3Hash) -> Result<Block>;
    /// Announce a new head, answering peers' requests for predecessor
    /// blocks through `supply`
    fn announce(
        &self,
        chain: &str,
        head: &Blake3Hash,
        supply: &dyn Fn(&Blake3Hash) -> Result<Option<Block>>,
    ) -> Result<()>;
}

/// TCP peer set; connections are opened per request
pub struct TcpPeers {
    peers: RwLock<Vec<String>>,
}

impl TcpPeers {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(Vec::new()),
        }
    }

    /// Add a peer address (`host` or `host:port`)
    pub fn connect(&self, peer: &str) {
        let addr = if peer.contains(':') {
            peer.to_string()
        } else {
            format!("{}:{}", peer, DEFAULT_PORT)
        };
        let mut peers = self.peers.write();
        if !peers.contains(&addr) {
            peers.push(addr);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    fn addresses(&self) -> Vec<String> {
        self.peers.read().clone()
    }
}

impl Default for TcpPeers {
    fn default() -> Self {
        Self::new()
    }
}

impl Network for TcpPeers {
    fn fetch_head(&self, chain: &str) -> Result<Option<Blake3Hash>> {
        let peers = self.addresses();
        if peers.is_empty() {
            return Ok(None);
        }
        let mut reached = false;
        for peer in &peers {
            match request(peer, &Request::Head { chain: chain.to_string() }) {
                Ok(Response::Head { hash }) => {
                    reached = true;
                    if hash.is_some() {
                        return Ok(hash);
                    }
                }
                Ok(other) => warn!(peer = %peer, ?other, "unexpected head response"),
                Err(e) => warn!(peer = %peer, error = %e, "head request failed"),
            }
        }
        if reached {
            Ok(None)
        } else {
            Err(Error::Network(format!("no peer reachable for {}", chain)))
        }
    }

    fn fetch_block(&self, chain: &str, hash: &Blake3Hash) -> Result<Block> {
        for peer in self.addresses() {
            let req = Request::Block {
                chain: chain.to_string(),
                hash: *hash,
            };
            match request(&peer, &req) {
                Ok(Response::Block { block: Some(block) }) => return Ok(block),
                Ok(Response::Block { block: None }) => {
                    debug!(peer = %peer, %hash, "peer does not have block")
                }
                Ok(other) => warn!(peer = %peer, ?other, "unexpected block response"),
                Err(e) => warn!(peer = %peer, error = %e, "block request failed"),
            }
        }
        Err(Error::MissingBlock { hash: *hash })
    }

    fn announce(
        &self,
        chain: &str,
        head: &Blake3Hash,
        supply: &dyn Fn(&Blake3Hash) -> Result<Option<Block>>,
    ) -> Result<()> {
        let peers = self.addresses();
        if peers.is_empty() {
            return Ok(());
        }
        let mut accepted = 0usize;
        for peer in &peers {
            match announce_to_peer(peer, chain, head, supply) {
                Ok(()) => accepted += 1,
                Err(e) => warn!(peer = %peer, error = %e, "announce failed"),
            }
        }
        if accepted == 0 {
            return Err(Error::Network(format!(
                "no peer accepted the head of {}",
                chain
            )));
        }
        Ok(())
    }
}

fn announce_to_peer(
    peer: &str,
    chain: &str,
    head: &Blake3Hash,
    supply: &dyn Fn(&Blake3Hash) -> Result<Option<Block>>,
) -> Result<()> {
    let mut stream = TcpStream::connect(peer).map_err(connect_error(peer))?;
    let mut hash = *head;
    loop {
        let block = supply(&hash)?.ok_or(Error::MissingBlock { hash })?;
        write_frame(
            &mut stream,
            &Request::Announce {
                chain: chain.to_string(),
                hash,
                block,
            },
        )?;
        match read_frame::<Response>(&mut stream)? {
            Response::Accepted => return Ok(()),
            Response::Need { hash: needed } => hash = needed,
            Response::Rejected { reason } => {
                return Err(Error::Network(format!("{} rejected announce: {}", peer, reason)))
            }
            other => {
                return Err(Error::Network(format!(
                    "{} sent unexpected announce response: {:?}",
                    peer, other
                )))
            }
        }
    }
}

fn request(peer: &str, req: &Request) -> Result<Response> {
    let mut stream = TcpStream::connect(peer).map_err(connect_error(peer))?;
    write_frame(&mut stream, req)?;
    read_frame(&mut stream)
}

fn connect_error(peer: &str) -> impl Fn(std::io::Error) -> Error + '_ {
    move |e| Error::Network(format!("connect {}: {}", peer, e))
}

fn write_frame<T: Serialize>(stream: &mut TcpStream, value: &T) -> Result<()> {
    let body = bincode::serialize(value)?;
    let len = u32::try_from(body.len())
        .map_err(|_| Error::Network("frame too large".to_string()))?;
    stream.write_all(&len.to_le_bytes())?;
    stream.write_all(&body)?;
    stream.flush()?;
    Ok(())
}

fn read_frame<T: for<'de> Deserialize<'de>>(stream: &mut TcpStream) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(Error::Network(format!("oversized frame: {} bytes", len)));
    }
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body)?;
    Ok(bincode::deserialize(&body)?)
}

/// Serve peer requests forever, one thread per connection.
///
/// `accept` maps a chain name the node has not opened to the threshold
/// it should be validated under, or `None` to reject it; the command
/// layer supplies the naming policy.
pub fn serve(
    node: Arc<Node>,
    addr: &str,
    accept: impl Fn(&str) -> Option<u32> + Send + Sync + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(addr)?;
    info!(addr, "serving peers");
    let accept = Arc::new(accept);
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let node = Arc::clone(&node);
                let accept = Arc::clone(&accept);
                std::thread::spawn(move || {
                    if let Err(e) = handle_peer(&node, stream, accept.as_ref()) {
                        debug!(error = %e, "peer connection ended");
                    }
                });
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
    Ok(())
}

fn handle_peer(
    node: &Node,
    mut stream: TcpStream,
    accept: &(impl Fn(&str) -> Option<u32> + ?Sized),
) -> Result<()> {
    loop {
        let request = match read_frame::<Request>(&mut stream) {
            Ok(request) => request,
            // Peer hung up between requests
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        match request {
            Request::Head { chain } => {
                let hash = node.cache().head(&chain)?;
                write_frame(&mut stream, &Response::Head { hash })?;
            }
            Request::Block { chain: _, hash } => {
                let block = node.cache().block(&hash)?;
                write_frame(&mut stream, &Response::Block { block })?;
            }
            Request::Announce { chain, hash, block } => {
                handle_announce(node, &mut stream, accept, chain, hash, block)?;
            }
        }
    }
}

fn handle_announce(
    node: &Node,
    stream: &mut TcpStream,
    accept: &(impl Fn(&str) -> Option<u32> + ?Sized),
    chain: String,
    head: Blake3Hash,
    block: Block,
) -> Result<()> {
    let threshold = match node.chain(&chain).map(|c| c.threshold).or_else(|| accept(&chain)) {
        Some(threshold) => threshold,
        None => {
            write_frame(
                stream,
                &Response::Rejected {
                    reason: format!("unknown chain {}", chain),
                },
            )?;
            return Ok(());
        }
    };

    // Collect the announced ancestry, newest first, asking the peer
    // for every block we cannot link locally.
    let validator = crate::chain::Chain::open(chain.clone(), threshold);
    let mut pending = vec![(head, block)];
    loop {
        let (hash, block) = pending.last().expect("pending never empty");
        if let Err(e) = validator.verify_block(hash, block) {
            write_frame(
                stream,
                &Response::Rejected {
                    reason: e.to_string(),
                },
            )?;
            return Ok(());
        }
        let missing = match block.previous {
            Some(prev) => {
                if node.cache().block(&prev)?.is_none() {
                    Some(prev)
                } else {
                    None
                }
            }
            None => None,
        };
        let Some(prev) = missing else { break };
        write_frame(stream, &Response::Need { hash: prev })?;
        match read_frame::<Request>(stream)? {
            Request::Announce { hash, block, .. } if hash == prev => {
                pending.push((hash, block));
            }
            other => {
                return Err(Error::Network(format!(
                    "expected block {} from peer, got {:?}",
                    prev, other
                )))
            }
        }
    }

    // Commit oldest-first, then move the head if the announced chain
    // is longer than what we hold.
    for (hash, block) in pending.iter().rev() {
        node.cache().put_block(hash, block)?;
    }
    node.adopt_head(&chain, &head)?;
    write_frame(stream, &Response::Accepted)?;
    debug!(chain = %chain, %head, "accepted announce");
    Ok(())
}
