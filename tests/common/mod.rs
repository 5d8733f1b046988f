use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use iroh_safe_client::{
    hash_content, Client, ClientConfig, Conflict, Data, DataRequest, ImmutableData, MessageId,
    NetworkError, PublicKey, ResponseSink, Routing, SendError, Signature, StructuredData, XorName,
};

/// In-memory stand-in for the storage network.
///
/// Enforces what real vaults enforce: content addressing, strictly
/// increasing structured versions and a majority of owner signatures.
#[derive(Default)]
pub struct MockVault {
    immutable: HashMap<XorName, ImmutableData>,
    structured: HashMap<(XorName, u64), StructuredData>,
}

pub type SharedVault = Arc<Mutex<MockVault>>;

pub fn shared_vault() -> SharedVault {
    Arc::new(Mutex::new(MockVault::default()))
}

impl MockVault {
    pub fn handle(&mut self, request: DataRequest) -> Result<Data, NetworkError> {
        match request {
            DataRequest::GetImmutable { name, .. } => self
                .immutable
                .get(&name)
                .cloned()
                .map(Data::Immutable)
                .ok_or(NetworkError::NoSuchData),
            DataRequest::PutImmutable(data) => {
                self.immutable.insert(data.name(), data.clone());
                Ok(Data::Immutable(data))
            }
            DataRequest::GetStructured {
                identifier,
                type_tag,
                version,
            } => {
                let stored = self
                    .structured
                    .get(&(identifier, type_tag))
                    .ok_or(NetworkError::NoSuchData)?;
                match version {
                    Some(v) if v != stored.version() => Err(NetworkError::NoSuchData),
                    _ => Ok(Data::Structured(stored.clone())),
                }
            }
            DataRequest::PutStructured(data) => {
                let key = (*data.identifier(), data.type_tag());
                if self.structured.contains_key(&key) {
                    return Err(NetworkError::Rejected("record already exists".into()));
                }
                self.structured.insert(key, data.clone());
                Ok(Data::Structured(data))
            }
            DataRequest::PostStructured(data) => {
                let key = (*data.identifier(), data.type_tag());
                let stored = self
                    .structured
                    .get(&key)
                    .ok_or(NetworkError::NoSuchData)?;
                if stored.version().checked_add(1) != Some(data.version()) {
                    return Err(NetworkError::Conflict(Conflict::StaleVersion {
                        current: stored.version(),
                        requested: data.version(),
                    }));
                }
                let payload = data
                    .data_to_sign()
                    .map_err(|err| NetworkError::Rejected(err.to_string()))?;
                check_quorum(stored.owner_keys(), &payload, data.signatures())?;
                self.structured.insert(key, data.clone());
                Ok(Data::Structured(data))
            }
            DataRequest::DeleteStructured {
                identifier,
                type_tag,
                version,
                signatures,
            } => {
                let key = (identifier, type_tag);
                let stored = self
                    .structured
                    .get(&key)
                    .ok_or(NetworkError::NoSuchData)?;
                if stored.version() != version {
                    return Err(NetworkError::Conflict(Conflict::StaleVersion {
                        current: stored.version(),
                        requested: version,
                    }));
                }
                let payload = stored
                    .data_to_sign()
                    .map_err(|err| NetworkError::Rejected(err.to_string()))?;
                check_quorum(stored.owner_keys(), &payload, &signatures)?;
                let removed = self.structured.remove(&key).ok_or(NetworkError::NoSuchData)?;
                Ok(Data::Structured(removed))
            }
        }
    }
}

/// Majority of `owners` must have signed `payload`.
fn check_quorum(
    owners: &[PublicKey],
    payload: &[u8],
    signatures: &[Signature],
) -> Result<(), NetworkError> {
    let required = owners.len() / 2 + 1;
    let provided = owners
        .iter()
        .filter(|owner| signatures.contains(&sign(owner, payload)))
        .count();
    if provided < required {
        return Err(NetworkError::Conflict(Conflict::InsufficientSignatures {
            required,
            provided,
        }));
    }
    Ok(())
}

/// Deterministic stand-in for a real signature scheme.
pub fn sign(owner: &PublicKey, payload: &[u8]) -> Signature {
    let mut input = owner.0.clone();
    input.extend_from_slice(payload);
    Signature(hash_content(&input).0.to_vec())
}

pub fn owner(byte: u8) -> PublicKey {
    PublicKey(vec![byte; 32])
}

/// Routing adapter backed by a [`MockVault`].
///
/// By default it answers inline, from inside `send`. With `hold(true)` it
/// queues requests until the test releases them, in any order.
#[derive(Clone)]
pub struct TestRouting {
    sink: ResponseSink,
    vault: SharedVault,
    held: Arc<Mutex<Vec<(MessageId, DataRequest)>>>,
    hold: Arc<AtomicBool>,
    refuse: Arc<AtomicBool>,
    tamper: Arc<AtomicBool>,
    sends: Arc<AtomicUsize>,
}

impl TestRouting {
    pub fn new(sink: ResponseSink, vault: SharedVault) -> Self {
        Self {
            sink,
            vault,
            held: Arc::new(Mutex::new(Vec::new())),
            hold: Arc::new(AtomicBool::new(false)),
            refuse: Arc::new(AtomicBool::new(false)),
            tamper: Arc::new(AtomicBool::new(false)),
            sends: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Alter immutable content on its way back to the client.
    pub fn tamper(&self, tamper: bool) {
        self.tamper.store(tamper, Ordering::SeqCst);
    }

    /// Requests accepted by `send` so far.
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn held_ids(&self) -> Vec<MessageId> {
        self.held.lock().iter().map(|(id, _)| *id).collect()
    }

    /// Answer one held request.
    pub fn release(&self, message_id: MessageId) {
        let request = {
            let mut held = self.held.lock();
            let pos = held
                .iter()
                .position(|(id, _)| *id == message_id)
                .expect("request is held");
            held.remove(pos).1
        };
        self.answer(message_id, request);
    }

    /// Drop a held request without answering it.
    pub fn discard(&self, message_id: MessageId) -> DataRequest {
        let mut held = self.held.lock();
        let pos = held
            .iter()
            .position(|(id, _)| *id == message_id)
            .expect("request is held");
        held.remove(pos).1
    }

    /// Deliver an arbitrary response through the sink.
    pub fn deliver(&self, message_id: MessageId, result: Result<Data, NetworkError>) {
        self.sink.deliver(message_id, result);
    }

    fn answer(&self, message_id: MessageId, request: DataRequest) {
        let mut result = self.vault.lock().handle(request);
        if self.tamper.load(Ordering::SeqCst) {
            if let Ok(Data::Immutable(data)) = &result {
                let mut content = data.content().to_vec();
                content.push(0xFF);
                result = Ok(Data::Immutable(ImmutableData::new(data.kind(), content)));
            }
        }
        self.sink.deliver(message_id, result);
    }
}

impl Routing for TestRouting {
    fn send(&self, message_id: MessageId, request: DataRequest) -> Result<(), SendError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SendError::Disconnected);
        }
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.held.lock().push((message_id, request));
        } else {
            self.answer(message_id, request);
        }
        Ok(())
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::default()
        .with_request_timeout(Duration::from_secs(5))
        .with_sweep_interval(Duration::from_millis(10))
}

pub fn test_client(vault: &SharedVault) -> Client<TestRouting> {
    test_client_with(vault, test_config())
}

pub fn test_client_with(vault: &SharedVault, config: ClientConfig) -> Client<TestRouting> {
    let vault = vault.clone();
    Client::new(config, move |sink| TestRouting::new(sink, vault))
}

pub fn routing(client: &Client<TestRouting>) -> &TestRouting {
    client.coordinator().routing()
}
