pub trait ConnectionPusher {
    fn post_to_connection(&self, connection_id: &str, data: &[u8]) -> Result<(), String>;
}
