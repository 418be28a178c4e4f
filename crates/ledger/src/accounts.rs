use std::str::FromStr;

use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

use crate::error::ValidationError;

/// Associated token account program.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Address of the token account holding `mint` on behalf of `owner`.
///
/// Program-derived from (owner, token program, mint), so it is a pure
/// function of its inputs and is never stored.
pub fn derive_token_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (address, _bump) = Pubkey::find_program_address(
        &[owner.as_ref(), spl_token::id().as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    );
    address
}

/// Parse a base58 account reference typed by the user.
pub fn parse_account(input: &str) -> Result<Pubkey, ValidationError> {
    Pubkey::from_str(input.trim()).map_err(|_| ValidationError::InvalidRecipient(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{USDC_MINT, USDT_MINT};

    #[test]
    fn derivation_is_deterministic() {
        let owner = Pubkey::new_unique();
        assert_eq!(
            derive_token_account(&owner, &USDC_MINT),
            derive_token_account(&owner, &USDC_MINT)
        );
    }

    #[test]
    fn distinct_inputs_give_distinct_accounts() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        let alice_usdc = derive_token_account(&alice, &USDC_MINT);
        assert_ne!(alice_usdc, derive_token_account(&alice, &USDT_MINT));
        assert_ne!(alice_usdc, derive_token_account(&bob, &USDC_MINT));
        assert_ne!(alice_usdc, alice);
    }

    #[test]
    fn derived_account_is_off_curve() {
        let owner = Pubkey::new_unique();
        assert!(!derive_token_account(&owner, &USDC_MINT).is_on_curve());
    }

    #[test]
    fn recipient_parsing() {
        let key = Pubkey::new_unique();
        assert_eq!(parse_account(&format!(" {key} ")).unwrap(), key);
        assert!(matches!(
            parse_account("0xabc"),
            Err(ValidationError::InvalidRecipient(_))
        ));
    }
}
