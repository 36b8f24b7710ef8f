//! Protocol knowledge seam for packet framing

/// Location of the fixed header window at the front of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField {
    /// Window length in bytes.
    pub length: usize,
}

/// Location of the encoded packet-size field, relative to the packet start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeField {
    /// Offset of the field from the start of the packet.
    pub start: usize,
    /// Field length in bytes.
    pub length: usize,
}

/// Protocol description consumed by the framing engine.
///
/// Implementations carry everything the scanner needs to recognize one
/// protocol: packet geometry plus the verification hooks called while
/// hunting for boundaries. All methods run synchronously on the scanning
/// thread; a panic aborts the scan.
pub trait PacketDescriptor {
    /// Upper bound on the size of any packet, in bytes. Sizes the probe
    /// scratch buffer and bounds every decoded packet size.
    fn max_packet_size(&self) -> usize;

    /// Geometry of the header window.
    fn header(&self) -> HeaderField;

    /// Geometry of the packet-size field.
    fn size_field(&self) -> SizeField;

    /// Whether `window`, exactly the header window, is a plausible packet
    /// start. Rejections cost the scanner one skipped byte.
    fn verify_header(&self, window: &[u8]) -> bool;

    /// Decode the total packet length in bytes from `field`, exactly the
    /// size-field window.
    fn decode_packet_size(&self, field: &[u8]) -> usize;

    /// Final acceptance check over the whole candidate packet.
    fn verify_packet(&self, packet: &[u8]) -> bool;
}
