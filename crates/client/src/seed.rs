//! Demo dataset shipped with the simulated backend.

use chrono::{DateTime, Utc};

use cardkeep_auth::Role;
use cardkeep_cards::{Address, Card, Contact, SEED_OWNER};
use cardkeep_core::{CardId, IdentityId};

/// A sign-in account available in offline mode.
#[derive(Debug, Clone)]
pub struct DemoAccount {
    pub id: &'static str,
    pub display_name: &'static str,
    pub email: &'static str,
    pub password: &'static str,
    pub role: Role,
}

pub const DEMO_ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        id: "demo-member",
        display_name: "Mara Member",
        email: "member@cardkeep.demo",
        password: "demo",
        role: Role::Member,
    },
    DemoAccount {
        id: "demo-publisher",
        display_name: "Paulo Publisher",
        email: "publisher@cardkeep.demo",
        password: "demo",
        role: Role::Publisher,
    },
    DemoAccount {
        id: "demo-admin",
        display_name: "Ada Admin",
        email: "admin@cardkeep.demo",
        password: "demo",
        role: Role::Administrator,
    },
];

struct SeedCard {
    title: &'static str,
    subtitle: &'static str,
    description: &'static str,
    category: &'static str,
    city: &'static str,
    country: &'static str,
    email: &'static str,
    phone: &'static str,
    url: &'static str,
    likes: u32,
    views: u64,
}

const SEED_CARDS: &[SeedCard] = &[
    SeedCard {
        title: "Harbor Bakery",
        subtitle: "Sourdough since 1998",
        description: "Wood-fired breads, pastries and coffee by the river.",
        category: "food",
        city: "Porto",
        country: "PT",
        email: "hello@harborbakery.example",
        phone: "+351 22 555 0101",
        url: "https://harborbakery.example",
        likes: 12,
        views: 240,
    },
    SeedCard {
        title: "Lumen Studio",
        subtitle: "Brand identity & print",
        description: "Logo design, business cards and packaging for small shops.",
        category: "design",
        city: "Lisbon",
        country: "PT",
        email: "studio@lumen.example",
        phone: "+351 21 555 0144",
        url: "https://lumen.example",
        likes: 8,
        views: 131,
    },
    SeedCard {
        title: "Northside Plumbing",
        subtitle: "24/7 emergency callouts",
        description: "Leaks, boilers and bathroom refits. Licensed and insured.",
        category: "services",
        city: "Porto",
        country: "PT",
        email: "jobs@northside.example",
        phone: "+351 22 555 0190",
        url: "https://northside.example",
        likes: 3,
        views: 88,
    },
    SeedCard {
        title: "Clara Mendes, CPA",
        subtitle: "Tax & bookkeeping",
        description: "Accounting for freelancers and small businesses.",
        category: "finance",
        city: "Coimbra",
        country: "PT",
        email: "clara@mendes-cpa.example",
        phone: "+351 239 555 012",
        url: "https://mendes-cpa.example",
        likes: 5,
        views: 64,
    },
    SeedCard {
        title: "Velo Repair Co.",
        subtitle: "Bikes fixed while you wait",
        description: "Tune-ups, wheel builds and commuter bike rentals.",
        category: "services",
        city: "Lisbon",
        country: "PT",
        email: "shop@velorepair.example",
        phone: "+351 21 555 0177",
        url: "https://velorepair.example",
        likes: 9,
        views: 152,
    },
    SeedCard {
        title: "Casa Verde Florist",
        subtitle: "Weddings, events, everyday",
        description: "Seasonal bouquets and plant care workshops.",
        category: "retail",
        city: "Faro",
        country: "PT",
        email: "flores@casaverde.example",
        phone: "+351 289 555 033",
        url: "https://casaverde.example",
        likes: 14,
        views: 205,
    },
];

// 2024-01-15T09:00:00Z
const SEED_EPOCH_SECS: i64 = 1_705_309_200;

/// The seed cards: `card-1` … `card-6`, all `is_seed_record`.
pub fn seed_cards() -> Vec<Card> {
    let owner: IdentityId = match SEED_OWNER.parse() {
        Ok(owner) => owner,
        Err(_) => return Vec::new(),
    };

    SEED_CARDS
        .iter()
        .enumerate()
        .filter_map(|(i, seed)| {
            let id: CardId = format!("card-{}", i + 1).parse().ok()?;
            let created_at =
                DateTime::<Utc>::from_timestamp(SEED_EPOCH_SECS + i as i64 * 86_400, 0).unwrap_or_default();
            Some(Card {
                id,
                owner_id: owner.clone(),
                title: seed.title.to_string(),
                subtitle: seed.subtitle.to_string(),
                description: seed.description.to_string(),
                contact: Contact {
                    email: Some(seed.email.to_string()),
                    phone: Some(seed.phone.to_string()),
                    url: Some(seed.url.to_string()),
                },
                address: Address {
                    city: seed.city.to_string(),
                    country: seed.country.to_string(),
                    ..Address::default()
                },
                category: seed.category.to_string(),
                media_ref: None,
                like_count: seed.likes,
                view_count: seed.views,
                is_seed_record: true,
                created_at,
                updated_at: created_at,
            })
        })
        .collect()
}

pub fn find_account(email: &str) -> Option<&'static DemoAccount> {
    DEMO_ACCOUNTS
        .iter()
        .find(|account| account.email.eq_ignore_ascii_case(email.trim()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn seed_cards_are_unique_seed_records() {
        let cards = seed_cards();
        assert_eq!(cards.len(), SEED_CARDS.len());
        assert!(cards.iter().all(|c| c.is_seed_record));
        let ids: HashSet<_> = cards.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), cards.len());
        assert_eq!(cards[0].id.as_str(), "card-1");
    }

    #[test]
    fn seed_contacts_pass_validation() {
        for card in seed_cards() {
            let draft = cardkeep_cards::CardDraft {
                title: card.title,
                subtitle: card.subtitle,
                description: card.description,
                contact: card.contact,
                address: card.address,
                category: card.category,
                media_ref: card.media_ref,
            };
            assert!(cardkeep_cards::validate_draft(&draft).is_ok());
        }
    }

    #[test]
    fn accounts_are_found_case_insensitively() {
        assert_eq!(find_account(" Admin@CardKeep.demo").map(|a| a.role), Some(Role::Administrator));
        assert!(find_account("nobody@cardkeep.demo").is_none());
    }
}
