//! The reversible byte-stream transformer interface (§3, §4.3), grounded on
//! `sc_proxy::stream::java::JavaStream`'s compress/encrypt pipeline but split
//! into two independent, individually-toggleable stages as the data model
//! calls for, rather than one monolithic stream type.

/// The outcome of asking a transformer whether it has a full unit of input
/// ready to hand back from `transform_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
  NeedMore,
  Ready,
  Invalid,
}

/// A reversible, individually-toggleable byte-stream filter (§3).
pub trait PacketTransformer: Send {
  /// Consumes from the front of `bytes`, returning the transformed output
  /// plus how many input bytes were consumed. When disabled, this is the
  /// identity: the whole buffer is consumed and returned unchanged.
  fn transform_in(&mut self, bytes: &[u8]) -> crate::error::Result<(Vec<u8>, usize)>;

  /// Transforms a complete outbound unit. When disabled, identity.
  fn transform_out(&mut self, bytes: &[u8]) -> Vec<u8>;

  /// Whether `bytes` holds a complete unit for [`Self::transform_in`].
  fn in_enough(&self, bytes: &[u8]) -> Readiness;

  /// Upper bound on the output size of `transform_out` for a given input
  /// length, for sizing a packet's reserved prefix.
  fn max_out_size(&self, in_len: usize) -> usize;

  fn start(&mut self);
  fn stop(&mut self);
  fn is_active(&self) -> bool;
}
