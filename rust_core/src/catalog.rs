// rust_core/src/catalog.rs
// The card catalog, built once per match view from `GET /api/cards` and
// treated as read-only afterwards. Minions and spells have separate id
// spaces, so the lookup key is the pair (card type, card id).

use std::collections::HashMap;

use crate::models::{CardDefinition, CardId, CardType, HandCard, MinionInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardKey {
    pub card_type: CardType,
    pub card_id: CardId,
}

impl CardKey {
    pub fn new(card_type: CardType, card_id: CardId) -> Self {
        Self { card_type, card_id }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CardCatalog {
    cards: HashMap<CardKey, CardDefinition>,
}

impl CardCatalog {
    /// Later duplicates of the same key replace earlier ones.
    pub fn new(cards: Vec<CardDefinition>) -> Self {
        let cards = cards
            .into_iter()
            .map(|c| (CardKey::new(c.card_type, c.id), c))
            .collect();
        Self { cards }
    }

    pub fn get(&self, card_type: CardType, card_id: CardId) -> Option<&CardDefinition> {
        self.cards.get(&CardKey::new(card_type, card_id))
    }

    pub fn for_hand(&self, card: &HandCard) -> Option<&CardDefinition> {
        self.get(card.card_type, card.card_id)
    }

    pub fn for_minion(&self, minion: &MinionInstance) -> Option<&CardDefinition> {
        self.get(CardType::Minion, minion.card_id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
