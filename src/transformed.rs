/// Outcome of a rewrite: `Yes` carries a rebuilt value, `No` hands back the
/// original one untouched (for `Arc` payloads, the identical allocation).
#[derive(Debug, PartialEq, Clone)]
pub enum Transformed<T> {
    Yes(T),
    No(T),
}

impl<T> Transformed<T> {
    pub fn get(self) -> T {
        match self {
            Transformed::Yes(value) | Transformed::No(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Transformed<U> {
        match self {
            Transformed::Yes(value) => Transformed::Yes(f(value)),
            Transformed::No(value) => Transformed::No(f(value)),
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }
}
