table! {
    users (id) {
        id -> Varchar,
        username -> Varchar,
        email -> Varchar,
        pass -> Varchar,
        profile_pic -> Varchar,
        refresh_token -> Nullable<Varchar>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    blogs (id) {
        id -> Varchar,
        title -> Varchar,
        content -> Varchar,
        thumbnail -> Varchar,
        category -> Varchar,
        status -> Varchar,
        author_id -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    comments (id) {
        id -> Varchar,
        content -> Varchar,
        author_id -> Varchar,
        blog_id -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    likes (user_id, blog_id) {
        user_id -> Varchar,
        blog_id -> Varchar,
    }
}

joinable!(blogs -> users (author_id));
joinable!(comments -> blogs (blog_id));
joinable!(likes -> blogs (blog_id));

allow_tables_to_appear_in_same_query!(users, blogs, comments, likes,);
