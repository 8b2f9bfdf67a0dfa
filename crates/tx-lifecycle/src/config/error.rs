use flex_error::{define_error, TraceError};

define_error! {
    Error {
        Io
            [ TraceError<std::io::Error> ]
            |_| { "config I/O error" },

        Decode
            [ TraceError<toml::de::Error> ]
            |_| { "invalid configuration" },

        Encode
            [ TraceError<toml::ser::Error> ]
            |_| { "invalid configuration" },

        InvalidGasPrice
            { price: String }
            |e| { format!("invalid gas price: {}", e.price) },

        MissingRestAddr
            |_| { "`rest_addr` must be set in the [chain] section when `simulation = \"rest\"`" },

        MultiplierTooSmall
            { value: f64 }
            |e| {
                format!("multiplier must be greater than or equal to {}, found {}",
                    crate::config::multiplier::Multiplier::MIN_BOUND, e.value)
            },

        MultiplierNotFinite
            { value: f64 }
            |e| { format!("multiplier must be a finite number, found {}", e.value) },
    }
}
