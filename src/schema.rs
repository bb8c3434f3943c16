diesel::table! {
    roles (id) {
        id -> Integer,
        name -> Text,
        name_ar -> Text,
        description -> Nullable<Text>,
        description_ar -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    permissions (id) {
        id -> Integer,
        name -> Text,
        name_ar -> Text,
        resource -> Text,
        action -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    role_permissions (id) {
        id -> Integer,
        role_id -> Integer,
        permission_id -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        password_hash -> Text,
        full_name_ar -> Text,
        full_name_en -> Text,
        role_id -> Integer,
        is_active -> Bool,
        last_login -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        deleted_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    entities (id) {
        id -> Integer,
        name_ar -> Text,
        name_en -> Text,
        #[sql_name = "type"]
        kind -> Text,
        contact_person -> Nullable<Text>,
        contact_email -> Nullable<Text>,
        contact_phone -> Nullable<Text>,
        address -> Nullable<Text>,
        is_active -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        deleted_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    correspondences (id) {
        id -> Integer,
        reference_number -> Text,
        #[sql_name = "type"]
        kind -> Text,
        subject -> Text,
        description -> Text,
        sender_entity_id -> Integer,
        receiver_entity_id -> Integer,
        correspondence_date -> Timestamp,
        review_status -> Text,
        current_status -> Text,
        created_by -> Integer,
        reviewed_by -> Nullable<Integer>,
        reviewed_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        deleted_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    correspondence_replies (id) {
        id -> Integer,
        correspondence_id -> Integer,
        parent_reply_id -> Nullable<Integer>,
        subject -> Text,
        body -> Text,
        created_by -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    attachments (id) {
        id -> Integer,
        correspondence_id -> Integer,
        file_name -> Text,
        original_name -> Text,
        file_path -> Text,
        file_size -> BigInt,
        mime_type -> Text,
        uploaded_by -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    status_history (id) {
        id -> Integer,
        correspondence_id -> Integer,
        old_status -> Text,
        new_status -> Text,
        changed_by -> Integer,
        notes -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    audit_logs (id) {
        id -> Integer,
        user_id -> Integer,
        action -> Text,
        resource -> Text,
        resource_id -> Nullable<Integer>,
        details -> Nullable<Text>,
        ip_address -> Nullable<Text>,
        user_agent -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::joinable!(users -> roles (role_id));
diesel::joinable!(role_permissions -> roles (role_id));
diesel::joinable!(role_permissions -> permissions (permission_id));
diesel::joinable!(correspondence_replies -> correspondences (correspondence_id));
diesel::joinable!(attachments -> correspondences (correspondence_id));
diesel::joinable!(status_history -> correspondences (correspondence_id));
diesel::joinable!(audit_logs -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    roles,
    permissions,
    role_permissions,
    users,
    entities,
    correspondences,
    correspondence_replies,
    attachments,
    status_history,
    audit_logs,
);
