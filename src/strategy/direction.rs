//! Per-pair swap direction toggle.
//!
//! Each pair alternates between its two exchanges. The direction only
//! moves forward after a confirmed successful swap; skipped and failed
//! attempts retry the same direction next time.

use std::collections::HashMap;
use tracing::debug;

use crate::types::{SwapDirection, SwapPair};

#[derive(Debug, Clone, Default)]
pub struct DirectionBook {
    next: HashMap<String, SwapDirection>,
}

impl DirectionBook {
    /// Seed every pair with its configured initial direction.
    pub fn new<'a>(pairs: impl IntoIterator<Item = &'a SwapPair>) -> Self {
        Self {
            next: pairs
                .into_iter()
                .map(|p| (p.id.clone(), p.initial_direction))
                .collect(),
        }
    }

    /// Direction the next attempt for `pair` will execute.
    pub fn current(&self, pair: &str) -> Option<SwapDirection> {
        self.next.get(pair).copied()
    }

    /// Flip after a confirmed success. Returns the new direction.
    pub fn confirm_success(&mut self, pair: &str) -> Option<SwapDirection> {
        let dir = self.next.get_mut(pair)?;
        *dir = dir.flipped();
        debug!(pair, next = %dir, "Direction flipped");
        Some(*dir)
    }

    pub fn snapshot(&self) -> HashMap<String, SwapDirection> {
        self.next.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Asset;
    use ethers::types::Address;

    fn pair(id: &str, initial: SwapDirection) -> SwapPair {
        SwapPair {
            id: id.to_string(),
            native: Asset::native("STT", Address::repeat_byte(1)),
            token: Asset::token("USDTG", Address::repeat_byte(2)),
            initial_direction: initial,
        }
    }

    #[test]
    fn test_flip_after_one_success() {
        let p = pair("STT_USDTG", SwapDirection::TokenToNative);
        let mut book = DirectionBook::new([&p]);
        assert_eq!(book.current("STT_USDTG"), Some(SwapDirection::TokenToNative));
        book.confirm_success("STT_USDTG");
        assert_eq!(book.current("STT_USDTG"), Some(SwapDirection::NativeToToken));
    }

    #[test]
    fn test_pairs_toggle_independently() {
        let a = pair("STT_USDTG", SwapDirection::NativeToToken);
        let b = pair("STT_NIA", SwapDirection::NativeToToken);
        let mut book = DirectionBook::new([&a, &b]);
        book.confirm_success("STT_NIA");
        assert_eq!(book.current("STT_USDTG"), Some(SwapDirection::NativeToToken));
        assert_eq!(book.current("STT_NIA"), Some(SwapDirection::TokenToNative));
        assert_eq!(book.confirm_success("STT_DOGE"), None);
    }

    #[test]
    fn test_only_successes_move_direction() {
        // s = success, k = skip, f = failure
        let script = "sfkkssfsfkfss";
        let p = pair("STT_USDTG", SwapDirection::TokenToNative);
        let mut book = DirectionBook::new([&p]);

        let mut successes = 0;
        for step in script.chars() {
            let before = book.current("STT_USDTG").unwrap();
            if step == 's' {
                book.confirm_success("STT_USDTG");
                successes += 1;
                assert_eq!(book.current("STT_USDTG").unwrap(), before.flipped());
            } else {
                assert_eq!(book.current("STT_USDTG").unwrap(), before);
            }
        }

        let expected = if successes % 2 == 0 {
            SwapDirection::TokenToNative
        } else {
            SwapDirection::NativeToToken
        };
        assert_eq!(book.current("STT_USDTG"), Some(expected));
    }
}
