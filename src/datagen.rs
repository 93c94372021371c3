//! Mock PII records for exercising the filter against a live cluster.
//!
//! Names come from a fixed set of users matching the SASL accounts of the
//! demo cluster, so a fraction of generated records pass the filter.

use rand::{seq::SliceRandom, Rng};
use serde::Serialize;

pub struct KafkaUser {
    pub full_name: &'static str,
    pub ssn: &'static str,
}

pub static KAFKA_USERS: [KafkaUser; 3] = [
    KafkaUser {
        full_name: "bob jones",
        ssn: "111-11-1111",
    },
    KafkaUser {
        full_name: "alice smith",
        ssn: "222-22-2222",
    },
    KafkaUser {
        full_name: "john hernandez",
        ssn: "333-33-3333",
    },
];

static STREETS: [&str; 6] = [
    "Maple Avenue",
    "Oak Street",
    "Cedar Lane",
    "Pine Road",
    "Elm Court",
    "Birch Boulevard",
];

static CITIES: [(&str, &str); 5] = [
    ("Springfield", "IL"),
    ("Riverside", "CA"),
    ("Franklin", "TN"),
    ("Greenville", "SC"),
    ("Madison", "WI"),
];

struct CardProvider {
    name: &'static str,
    prefix: &'static str,
    length: usize,
    security_code_length: usize,
}

static CARD_PROVIDERS: [CardProvider; 4] = [
    CardProvider {
        name: "VISA 16 digit",
        prefix: "4",
        length: 16,
        security_code_length: 3,
    },
    CardProvider {
        name: "Mastercard",
        prefix: "51",
        length: 16,
        security_code_length: 3,
    },
    CardProvider {
        name: "American Express",
        prefix: "37",
        length: 15,
        security_code_length: 4,
    },
    CardProvider {
        name: "Discover",
        prefix: "6011",
        length: 16,
        security_code_length: 3,
    },
];

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PiiRecord {
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub ssn: String,
    pub address: String,
    pub credit_card: CreditCard,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CreditCard {
    pub provider: String,
    pub number: String,
    pub expiration_date: String,
    pub security_code: String,
}

pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> PiiRecord {
    let user = KAFKA_USERS.choose(rng).unwrap_or(&KAFKA_USERS[0]);
    let (first_name, last_name) = user
        .full_name
        .split_once(' ')
        .unwrap_or((user.full_name, ""));

    PiiRecord {
        full_name: user.full_name.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{first_name}{last_name}@yahoo.com"),
        ssn: user.ssn.to_string(),
        address: address(rng),
        credit_card: credit_card(rng),
    }
}

fn address<R: Rng + ?Sized>(rng: &mut R) -> String {
    let number = rng.gen_range(1..10_000);
    let street = STREETS.choose(rng).unwrap_or(&STREETS[0]);
    let (city, state) = CITIES.choose(rng).unwrap_or(&CITIES[0]);
    let zip = rng.gen_range(10_000..100_000);

    format!("{number} {street} {city}, {state} {zip}")
}

fn credit_card<R: Rng + ?Sized>(rng: &mut R) -> CreditCard {
    let provider = CARD_PROVIDERS.choose(rng).unwrap_or(&CARD_PROVIDERS[0]);

    let mut number = provider.prefix.to_string();
    number.push_str(&digits(rng, provider.length - provider.prefix.len()));

    CreditCard {
        provider: provider.name.to_string(),
        number,
        expiration_date: format!(
            "{:02}/{:02}",
            rng.gen_range(1..=12),
            rng.gen_range(26..=35)
        ),
        security_code: digits(rng, provider.security_code_length),
    }
}

fn digits<R: Rng + ?Sized>(rng: &mut R, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
