use rand::{distributions::Alphanumeric, Rng};

/// Generates a fresh transaction id for requests that did not supply one.
pub fn new_transaction_id() -> String {
    format!("txn-{}", random_suffix(16))
}

pub fn new_message_id() -> String {
    format!("msg-{}", random_suffix(16))
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect::<String>().to_lowercase()
}
