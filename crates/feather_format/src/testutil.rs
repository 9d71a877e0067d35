//! Fixtures shared by unit tests.

crate::host_enum! {
    pub enum Color {
        Red = 0,
        Green = 1,
        Blue = 2,
    }
}

crate::host_enum! {
    /// Two members share a value, and neither name nor order matches the
    /// values.
    #[allow(non_camel_case_types)]
    pub enum Greek {
        Beta = 10,
        Alpha = 1,
        alpha2 = 1,
    }
}

pub fn levels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
