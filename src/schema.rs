// researcher realm

table! {
    materials (id) {
        id -> Bigint,
        name -> Varchar,
        calories -> Nullable<Double>,
        protein -> Nullable<Double>,
        total_fat -> Nullable<Double>,
        saturated_fat -> Nullable<Double>,
        trans_fat -> Nullable<Double>,
        cholesterol -> Nullable<Double>,
        carbohydrates -> Nullable<Double>,
        sugar -> Nullable<Double>,
        fiber -> Nullable<Double>,
        natrium -> Nullable<Double>,
        amino_acid -> Nullable<Double>,
        vitamin_d -> Nullable<Double>,
        magnesium -> Nullable<Double>,
        iron -> Nullable<Double>,
        test_date -> Nullable<Date>,
        notes -> Nullable<Text>,
        source -> Nullable<Varchar>,
        image_url -> Nullable<Varchar>,
        user_id -> Nullable<Varchar>,
        created_at -> Timestamp,
    }
}

table! {
    categories (id) {
        id -> Bigint,
        name -> Varchar,
        calories_min -> Nullable<Double>,
        calories_max -> Nullable<Double>,
        protein_min -> Nullable<Double>,
        protein_max -> Nullable<Double>,
        total_fat_min -> Nullable<Double>,
        total_fat_max -> Nullable<Double>,
        saturated_fat_min -> Nullable<Double>,
        saturated_fat_max -> Nullable<Double>,
        trans_fat_min -> Nullable<Double>,
        trans_fat_max -> Nullable<Double>,
        cholesterol_min -> Nullable<Double>,
        cholesterol_max -> Nullable<Double>,
        carbohydrates_min -> Nullable<Double>,
        carbohydrates_max -> Nullable<Double>,
        sugar_min -> Nullable<Double>,
        sugar_max -> Nullable<Double>,
        fiber_min -> Nullable<Double>,
        fiber_max -> Nullable<Double>,
        natrium_min -> Nullable<Double>,
        natrium_max -> Nullable<Double>,
        amino_acid_min -> Nullable<Double>,
        amino_acid_max -> Nullable<Double>,
        vitamin_d_min -> Nullable<Double>,
        vitamin_d_max -> Nullable<Double>,
        magnesium_min -> Nullable<Double>,
        magnesium_max -> Nullable<Double>,
        iron_min -> Nullable<Double>,
        iron_max -> Nullable<Double>,
    }
}

table! {
    material_categories (material_id, category_id) {
        material_id -> Bigint,
        category_id -> Bigint,
    }
}

joinable!(material_categories -> materials (material_id));
joinable!(material_categories -> categories (category_id));

allow_tables_to_appear_in_same_query!(materials, categories, material_categories);

// nutritionist realm

table! {
    recipes (id) {
        id -> Bigint,
        user_id -> Nullable<Varchar>,
        name -> Varchar,
        description -> Nullable<Text>,
        category -> Varchar,
        steps -> Text,
        calories -> Double,
        protein -> Double,
        total_fat -> Double,
        saturated_fat -> Double,
        trans_fat -> Double,
        cholesterol -> Double,
        carbohydrates -> Double,
        sugar -> Double,
        fiber -> Double,
        natrium -> Double,
        amino_acid -> Double,
        vitamin_d -> Double,
        magnesium -> Double,
        iron -> Double,
        created_at -> Timestamp,
    }
}

table! {
    recipe_materials (recipe_id, material_id) {
        recipe_id -> Bigint,
        material_id -> Bigint,
        quantity -> Double,
    }
}

joinable!(recipe_materials -> recipes (recipe_id));

allow_tables_to_appear_in_same_query!(recipes, recipe_materials);
