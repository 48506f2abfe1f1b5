#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
  #[default]
  Tcp,
  Udp,
}

impl Protocol {
  pub fn is_stream(self) -> bool {
    matches!(self, Protocol::Tcp)
  }
}
