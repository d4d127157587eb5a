pub mod data {
    diesel::table! {
        data.workgroups (id) {
            id -> Uuid,
            name -> Text,
            raw_json -> Jsonb,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        data.meetings (id) {
            id -> Uuid,
            workgroup_id -> Uuid,
            meeting_date -> Date,
            meeting_type -> Nullable<Text>,
            host -> Nullable<Text>,
            documenter -> Nullable<Text>,
            attendees -> Array<Text>,
            purpose -> Nullable<Text>,
            video_links -> Array<Text>,
            working_docs -> Nullable<Jsonb>,
            timestamped_video -> Nullable<Jsonb>,
            tags -> Nullable<Jsonb>,
            raw_json -> Jsonb,
            source_url -> Nullable<Text>,
            ingestion_run_id -> Nullable<Uuid>,
            validation_warnings_count -> Int4,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        data.agenda_items (id) {
            id -> Uuid,
            meeting_id -> Uuid,
            status -> Nullable<Text>,
            order_index -> Int4,
            raw_json -> Jsonb,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        data.action_items (id) {
            id -> Uuid,
            agenda_item_id -> Uuid,
            text -> Text,
            assignee -> Nullable<Text>,
            due_date -> Nullable<Date>,
            status -> Nullable<Text>,
            raw_json -> Jsonb,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        data.decision_items (id) {
            id -> Uuid,
            agenda_item_id -> Uuid,
            decision_text -> Text,
            rationale -> Nullable<Text>,
            effect_scope -> Nullable<Text>,
            raw_json -> Jsonb,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        data.discussion_points (id) {
            id -> Uuid,
            agenda_item_id -> Uuid,
            point_text -> Text,
            order_index -> Int4,
            raw_json -> Jsonb,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        data.meeting_summary_view (id) {
            id -> Uuid,
            source_name -> Nullable<Text>,
            workgroup -> Text,
            meeting_date -> Date,
            ingested_at -> Timestamptz,
            title -> Nullable<Text>,
            validation_warnings_count -> Int4,
            missing_fields -> Jsonb,
            normalized_fields -> Jsonb,
            provenance -> Jsonb,
            raw_json_reference -> Text,
        }
    }

    diesel::joinable!(meetings -> workgroups (workgroup_id));
    diesel::joinable!(agenda_items -> meetings (meeting_id));
    diesel::joinable!(action_items -> agenda_items (agenda_item_id));
    diesel::joinable!(decision_items -> agenda_items (agenda_item_id));
    diesel::joinable!(discussion_points -> agenda_items (agenda_item_id));

    diesel::allow_tables_to_appear_in_same_query!(
        workgroups,
        meetings,
        agenda_items,
        action_items,
        decision_items,
        discussion_points,
    );
}
