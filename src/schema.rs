// Diesel schema for the blogharvest catalog database.
// Kept in sync with the cetane migrations by tests/schema_parity.rs.

diesel::table! {
    data (id) {
        id -> Integer,
        company -> Text,
        title -> Text,
        tags -> Text,
        year -> Text,
        url -> Text,
    }
}

diesel::table! {
    blog_content (blog_id) {
        blog_id -> Text,
        title -> Text,
        company -> Text,
        tags -> Text,
        year -> Text,
        url -> Text,
        content_length -> BigInt,
        image_count -> BigInt,
        text_file_path -> Nullable<Text>,
        images_dir_path -> Nullable<Text>,
        extraction_method -> Text,
        extraction_quality -> Text,
        has_images -> Bool,
        has_embedded_links -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    pdf_files (pdf_id) {
        pdf_id -> Text,
        title -> Text,
        company -> Text,
        tags -> Text,
        year -> Text,
        url -> Text,
        file_path -> Text,
        file_size -> BigInt,
        file_type -> Text,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(blog_content, data, pdf_files);
