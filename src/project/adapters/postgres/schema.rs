//! Diesel schema for project persistence.

diesel::table! {
    /// Project ownership records.
    project (id) {
        /// Store-assigned project identifier.
        id -> Int8,
        /// Unique URL-safe short name.
        #[max_length = 255]
        short_name -> Varchar,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Owning user.
        owner_id -> Int8,
        /// Owner and co-owner ids, owner first.
        owners_ids -> Array<Int8>,
        /// Creation timestamp.
        created -> Timestamptz,
    }
}
