//! Data model: the values the client moves across the network.
//!
//! - **Addressing**: [`XorName`], [`DataIdentifier`], [`hash_content`]
//! - **Immutable data**: [`ImmutableData`] tagged with an [`ImmutableDataType`],
//!   addressed by the BLAKE3 hash of its content
//! - **Structured data**: [`StructuredData`], owner-versioned and bounded by
//!   [`MAX_STRUCTURED_DATA_SIZE_IN_BYTES`]
//! - **Payloads**: [`Data`], the value carried by a resolved response

use std::fmt;

use iroh_blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on the `data` field of a [`StructuredData`] (100 KiB).
///
/// Checked before submission, so an oversized request never reaches the
/// routing layer.
pub const MAX_STRUCTURED_DATA_SIZE_IN_BYTES: usize = 102_400;

/// Length in bytes of a network address.
pub const XOR_NAME_LEN: usize = 32;

// ============================================================================
// Hashing
// ============================================================================

/// Compute a 32-byte BLAKE3 digest of the input data.
fn blake3_digest(data: &[u8]) -> [u8; XOR_NAME_LEN] {
    let mut hasher = Hasher::new();
    hasher.update(data);
    let digest = hasher.finalize();

    let mut out = [0u8; XOR_NAME_LEN];
    out.copy_from_slice(digest.as_bytes());
    out
}

/// Compute the content address of raw bytes.
///
/// ```
/// use iroh_safe_client::hash_content;
///
/// let name = hash_content(b"hello world");
/// assert_eq!(name, hash_content(b"hello world"));
/// assert_ne!(name, hash_content(b"goodbye world"));
/// ```
pub fn hash_content(data: &[u8]) -> XorName {
    XorName(blake3_digest(data))
}

// ============================================================================
// Addresses
// ============================================================================

/// A fixed-length network address. Equality is byte equality.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct XorName(pub [u8; XOR_NAME_LEN]);

impl XorName {
    /// Borrow the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; XOR_NAME_LEN] {
        &self.0
    }
}

impl fmt::Display for XorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for XorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Six bytes are enough to tell addresses apart in logs.
        write!(f, "XorName({}..)", hex::encode(&self.0[..6]))
    }
}

impl From<[u8; XOR_NAME_LEN]> for XorName {
    fn from(bytes: [u8; XOR_NAME_LEN]) -> Self {
        Self(bytes)
    }
}

/// The stable network location of a piece of data.
///
/// Immutable data is located by its content address alone; structured data by
/// the `(identifier, type_tag)` pair, which never changes across versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataIdentifier {
    /// Content address of an [`ImmutableData`].
    Immutable(XorName),
    /// Identifier and type tag of a [`StructuredData`].
    Structured(XorName, u64),
}

impl DataIdentifier {
    /// The routing name of the identified data.
    /// Routing name of the payload.
    pub fn name(&self) -> XorName {
        match self {
            DataIdentifier::Immutable(name) => *name,
            DataIdentifier::Structured(identifier, type_tag) => {
                structured_name(identifier, *type_tag)
            }
        }
    }
}

impl fmt::Display for DataIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataIdentifier::Immutable(name) => write!(f, "immutable:{name}"),
            DataIdentifier::Structured(identifier, tag) => {
                write!(f, "structured:{identifier}/{tag}")
            }
        }
    }
}

/// Routing name of a structured data chunk: H(identifier || type_tag).
fn structured_name(identifier: &XorName, type_tag: u64) -> XorName {
    let mut hasher = Hasher::new();
    hasher.update(identifier.as_bytes());
    hasher.update(&type_tag.to_be_bytes());
    let digest = hasher.finalize();

    let mut out = [0u8; XOR_NAME_LEN];
    out.copy_from_slice(digest.as_bytes());
    XorName(out)
}

// ============================================================================
// Immutable Data
// ============================================================================

/// Storage class of an immutable chunk.
///
/// The network keeps `Backup` and `Sacrificial` copies alongside the `Normal`
/// one; `Sacrificial` copies may be reclaimed under storage pressure. Each
/// class lives at its own address, derived by re-hashing the previous class's
/// address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImmutableDataType {
    Normal,
    Backup,
    Sacrificial,
}

/// Content-addressed, never-mutated payload.
///
/// The address is always derived from `kind` and `content`. It is not part of
/// the serialized form, so a value decoded off the wire carries the address of
/// what it actually contains.
///
/// ```
/// use iroh_safe_client::{hash_content, ImmutableData, ImmutableDataType};
///
/// let chunk = ImmutableData::new(ImmutableDataType::Normal, b"hello".to_vec());
/// assert_eq!(chunk.name(), hash_content(b"hello"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireImmutableData")]
pub struct ImmutableData {
    kind: ImmutableDataType,
    content: Vec<u8>,
    #[serde(skip)]
    name: XorName,
}

/// Serialized shape of [`ImmutableData`]: everything but the address.
#[derive(Deserialize)]
struct WireImmutableData {
    kind: ImmutableDataType,
    content: Vec<u8>,
}

impl From<WireImmutableData> for ImmutableData {
    fn from(wire: WireImmutableData) -> Self {
        ImmutableData::new(wire.kind, wire.content)
    }
}

impl ImmutableData {
    /// Create a chunk and compute its address.
    pub fn new(kind: ImmutableDataType, content: Vec<u8>) -> Self {
        let name = Self::compute_name(kind, &content);
        Self {
            kind,
            content,
            name,
        }
    }

    /// Address a chunk of the given class and content would have.
    pub fn compute_name(kind: ImmutableDataType, content: &[u8]) -> XorName {
        let normal = hash_content(content);
        match kind {
            ImmutableDataType::Normal => normal,
            ImmutableDataType::Backup => hash_content(normal.as_bytes()),
            ImmutableDataType::Sacrificial => {
                let backup = hash_content(normal.as_bytes());
                hash_content(backup.as_bytes())
            }
        }
    }

    /// Storage class of this chunk.
    pub fn kind(&self) -> ImmutableDataType {
        self.kind
    }

    /// The stored bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Consume the chunk, returning its content.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// The content address of this chunk.
    pub fn name(&self) -> XorName {
        self.name
    }

    /// Identifier used to match responses for this chunk.
    pub fn identifier(&self) -> DataIdentifier {
        DataIdentifier::Immutable(self.name)
    }

    /// Number of content bytes.
    pub fn payload_size(&self) -> usize {
        self.content.len()
    }
}

impl fmt::Debug for ImmutableData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImmutableData")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("len", &self.content.len())
            .finish()
    }
}

// ============================================================================
// Structured Data
// ============================================================================

/// Opaque public key of a data owner, supplied by the authentication layer.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub Vec<u8>);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = &self.0[..self.0.len().min(6)];
        write!(f, "PublicKey({}..)", hex::encode(prefix))
    }
}

/// Opaque signature over [`StructuredData::data_to_sign`]. The client
/// transports signatures but never verifies them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// Mutable, owner-versioned payload.
///
/// `(identifier, type_tag)` addresses the record across all of its versions.
/// The network accepts version `v + 1` over version `v` only when it carries
/// enough signatures from the owners of version `v`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredData {
    identifier: XorName,
    type_tag: u64,
    data: Vec<u8>,
    version: u64,
    owner_keys: Vec<PublicKey>,
    previous_owner_keys: Vec<PublicKey>,
    signatures: Vec<Signature>,
}

/// Borrowed view of everything that owners sign.
#[derive(Serialize)]
struct SignedFields<'a> {
    identifier: &'a XorName,
    type_tag: u64,
    data: &'a [u8],
    version: u64,
    owner_keys: &'a [PublicKey],
    previous_owner_keys: &'a [PublicKey],
}

impl StructuredData {
    /// Build a new version of a structured record.
    ///
    /// Fails with [`ClientError::SizeExceeded`] if `data` is larger than
    /// [`MAX_STRUCTURED_DATA_SIZE_IN_BYTES`].
    pub fn new(
        type_tag: u64,
        identifier: XorName,
        version: u64,
        data: Vec<u8>,
        owner_keys: Vec<PublicKey>,
        previous_owner_keys: Vec<PublicKey>,
    ) -> Result<Self, ClientError> {
        let sd = Self {
            identifier,
            type_tag,
            data,
            version,
            owner_keys,
            previous_owner_keys,
            signatures: Vec::new(),
        };
        sd.validate_size()?;
        Ok(sd)
    }

    /// Check the payload against [`MAX_STRUCTURED_DATA_SIZE_IN_BYTES`].
    ///
    /// Values decoded off the wire skip [`StructuredData::new`], so the client
    /// re-checks before every submission.
    pub fn validate_size(&self) -> Result<(), ClientError> {
        if self.data.len() > MAX_STRUCTURED_DATA_SIZE_IN_BYTES {
            return Err(ClientError::SizeExceeded {
                size: self.data.len(),
                max: MAX_STRUCTURED_DATA_SIZE_IN_BYTES,
            });
        }
        Ok(())
    }

    /// Bytes that owners of the previous version sign to authorise this one.
    pub fn data_to_sign(&self) -> Result<Vec<u8>, ClientError> {
        let fields = SignedFields {
            identifier: &self.identifier,
            type_tag: self.type_tag,
            data: &self.data,
            version: self.version,
            owner_keys: &self.owner_keys,
            previous_owner_keys: &self.previous_owner_keys,
        };
        serde_json::to_vec(&fields).map_err(|err| ClientError::Serialization(err.to_string()))
    }

    /// Attach one more signature.
    pub fn add_signature(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    /// Replace all signatures, returning the old ones.
    pub fn replace_signatures(&mut self, signatures: Vec<Signature>) -> Vec<Signature> {
        std::mem::replace(&mut self.signatures, signatures)
    }

    /// Caller-chosen identifier, shared by every version of the record.
    pub fn identifier(&self) -> &XorName {
        &self.identifier
    }

    /// Application-defined type tag.
    pub fn type_tag(&self) -> u64 {
        self.type_tag
    }

    /// Payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Version number; each update increments it by one.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Keys that own this version.
    pub fn owner_keys(&self) -> &[PublicKey] {
        &self.owner_keys
    }

    /// Keys that owned the previous version and authorise this one.
    pub fn previous_owner_keys(&self) -> &[PublicKey] {
        &self.previous_owner_keys
    }

    /// Signatures over [`data_to_sign`](Self::data_to_sign).
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Routing name, stable across versions.
    pub fn name(&self) -> XorName {
        structured_name(&self.identifier, self.type_tag)
    }

    /// Identifier used to match responses for this record.
    pub fn data_identifier(&self) -> DataIdentifier {
        DataIdentifier::Structured(self.identifier, self.type_tag)
    }

    /// Number of payload bytes checked against the size ceiling.
    pub fn payload_size(&self) -> usize {
        self.data.len()
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Payload of a resolved response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Data {
    Immutable(ImmutableData),
    Structured(StructuredData),
}

impl Data {
    /// Where this payload lives on the network.
    pub fn identifier(&self) -> DataIdentifier {
        match self {
            Data::Immutable(data) => data.identifier(),
            Data::Structured(data) => data.data_identifier(),
        }
    }

    /// Routing name of the payload.
    pub fn name(&self) -> XorName {
        match self {
            Data::Immutable(data) => data.name(),
            Data::Structured(data) => data.name(),
        }
    }

    pub fn payload_size(&self) -> usize {
        match self {
            Data::Immutable(data) => data.payload_size(),
            Data::Structured(data) => data.payload_size(),
        }
    }
}

impl From<ImmutableData> for Data {
    fn from(data: ImmutableData) -> Self {
        Data::Immutable(data)
    }
}

impl From<StructuredData> for Data {
    fn from(data: StructuredData) -> Self {
        Data::Structured(data)
    }
}
