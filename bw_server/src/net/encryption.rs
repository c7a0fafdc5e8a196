//! Whole-stream AES-128/CFB8 encryption (§4.3), grounded directly on
//! `sc_proxy::stream::java::JavaStream`'s `cipher: Option<Cfb8<Aes128>>`
//! field and its `enable_encryption`/`write_data` pair.

use super::transform::{PacketTransformer, Readiness};
use aes::{
  cipher::{AsyncStreamCipher, NewCipher},
  Aes128,
};
use cfb8::Cfb8;

pub struct EncryptionTransformer {
  cipher: Option<Cfb8<Aes128>>,
}

impl EncryptionTransformer {
  pub fn new() -> Self { EncryptionTransformer { cipher: None } }

  /// The 16-byte shared secret doubles as key and IV, per §4.3's "self
  /// feedback mode of block size 1".
  pub fn enable(&mut self, secret: &[u8; 16]) {
    self.cipher = Some(Cfb8::new_from_slices(secret, secret).expect("16-byte key/iv is always valid"));
  }
}

impl Default for EncryptionTransformer {
  fn default() -> Self { Self::new() }
}

impl PacketTransformer for EncryptionTransformer {
  fn transform_in(&mut self, bytes: &[u8]) -> crate::error::Result<(Vec<u8>, usize)> {
    let mut out = bytes.to_vec();
    if let Some(c) = &mut self.cipher {
      c.decrypt(&mut out);
    }
    Ok((out, bytes.len()))
  }

  fn transform_out(&mut self, bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    if let Some(c) = &mut self.cipher {
      c.encrypt(&mut out);
    }
    out
  }

  /// Length-preserving: always ready.
  fn in_enough(&self, _bytes: &[u8]) -> Readiness { Readiness::Ready }

  fn max_out_size(&self, in_len: usize) -> usize { in_len }

  fn start(&mut self) { debug!("encryption enabled"); }
  fn stop(&mut self) { self.cipher = None; }
  fn is_active(&self) -> bool { self.cipher.is_some() }
}
