//! Wallet join secret.
//!
//! The creator of a shared wallet hands this string to the other copayers.
//! It carries the wallet id, the wallet private key (from which the shared
//! encrypting key is derived) and the network:
//!
//! ```text
//! <wallet id, base58, right-padded with '0' to 22 chars><WIF private key><L|T>
//! ```
//!
//! `'0'` is not in the base58 alphabet, so the padding is unambiguous.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use super::CredentialsError;
use crate::address::Network;
use crate::crypto::keys::PrivateKey;

const WALLET_ID_WIDTH: usize = 22;
const LIVENET_WIF: u8 = 0x80;
const TESTNET_WIF: u8 = 0xef;
const COMPRESSED_FLAG: u8 = 0x01;

#[derive(Clone, PartialEq, Eq)]
pub struct WalletSecret {
    pub wallet_id: Uuid,
    pub wallet_priv_key: PrivateKey,
    pub network: Network,
}

impl WalletSecret {
    pub fn new(wallet_id: Uuid, wallet_priv_key: PrivateKey, network: Network) -> Self {
        Self {
            wallet_id,
            wallet_priv_key,
            network,
        }
    }

    fn wif(&self) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(match self.network {
            Network::Livenet => LIVENET_WIF,
            Network::Testnet => TESTNET_WIF,
        });
        payload.extend_from_slice(&self.wallet_priv_key.to_bytes());
        payload.push(COMPRESSED_FLAG);
        bs58::encode(payload).with_check().into_string()
    }
}

impl fmt::Display for WalletSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = bs58::encode(self.wallet_id.as_bytes()).into_string();
        let tag = match self.network {
            Network::Livenet => 'L',
            Network::Testnet => 'T',
        };
        write!(f, "{:0<width$}{}{}", id, self.wif(), tag, width = WALLET_ID_WIDTH)
    }
}

impl fmt::Debug for WalletSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSecret")
            .field("wallet_id", &self.wallet_id)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl FromStr for WalletSecret {
    type Err = CredentialsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| CredentialsError::InvalidSecret(why.to_string());
        let s = s.trim();
        if !s.is_ascii() || s.len() <= WALLET_ID_WIDTH + 1 {
            return Err(invalid("too short"));
        }

        let (id_part, rest) = s.split_at(WALLET_ID_WIDTH);
        let (wif_part, tag) = rest.split_at(rest.len() - 1);

        let network = match tag {
            "L" => Network::Livenet,
            "T" => Network::Testnet,
            _ => return Err(invalid("unknown network tag")),
        };

        let id_bytes = bs58::decode(id_part.trim_end_matches('0'))
            .into_vec()
            .map_err(|_| invalid("wallet id is not base58"))?;
        let wallet_id = Uuid::from_slice(&id_bytes).map_err(|_| invalid("wallet id is not a uuid"))?;

        let payload = bs58::decode(wif_part)
            .with_check(None)
            .into_vec()
            .map_err(|_| invalid("private key checksum mismatch"))?;
        let expected_version = match network {
            Network::Livenet => LIVENET_WIF,
            Network::Testnet => TESTNET_WIF,
        };
        let key_bytes = match payload.as_slice() {
            [version, key @ .., COMPRESSED_FLAG] if *version == expected_version && key.len() == 32 => key,
            [version, key @ ..] if *version == expected_version && key.len() == 32 => key,
            _ => return Err(invalid("malformed private key")),
        };
        let wallet_priv_key =
            PrivateKey::from_bytes(key_bytes).map_err(|_| invalid("private key out of range"))?;

        Ok(Self {
            wallet_id,
            wallet_priv_key,
            network,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_roundtrip() {
        let secret = WalletSecret::new(Uuid::new_v4(), PrivateKey::generate(), Network::Livenet);
        let s = secret.to_string();
        assert!(s.ends_with('L'));
        assert_eq!(s.parse::<WalletSecret>().unwrap(), secret);
    }

    #[test]
    fn testnet_tag() {
        let secret = WalletSecret::new(Uuid::new_v4(), PrivateKey::generate(), Network::Testnet);
        let parsed: WalletSecret = secret.to_string().parse().unwrap();
        assert_eq!(parsed.network, Network::Testnet);
    }

    #[test]
    fn malformed_secrets_are_invalid_secret() {
        for bad in ["", "short", "0000000000000000000000abcX", "not a secret at all, really not"] {
            assert!(
                matches!(bad.parse::<WalletSecret>(), Err(CredentialsError::InvalidSecret(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn flipped_network_tag_rejected() {
        let secret = WalletSecret::new(Uuid::new_v4(), PrivateKey::generate(), Network::Livenet);
        let mut s = secret.to_string();
        s.pop();
        s.push('T');
        assert!(s.parse::<WalletSecret>().is_err());
    }

    #[test]
    fn debug_hides_key() {
        let secret = WalletSecret::new(Uuid::new_v4(), PrivateKey::generate(), Network::Livenet);
        assert!(!format!("{:?}", secret).contains(&secret.wallet_priv_key.to_hex()));
    }
}
