//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import catalog types
use crate::commerce::{Cart, Product};

// Import callback data
use crate::dialogue::{Button, CART_CALLBACK, MENU_CALLBACK, PAY_CALLBACK};

/// Quantities in kg offered on a product card
pub const QUANTITY_OPTIONS: [u32; 3] = [1, 5, 10];

/// Telegram caps photo captions at 1024 characters
pub const MAX_CAPTION_CHARS: usize = 1024;

fn cart_button(language_code: Option<&str>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(t_lang("button-cart", language_code), CART_CALLBACK)
}

fn menu_button(language_code: Option<&str>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(t_lang("button-back-to-menu", language_code), MENU_CALLBACK)
}

/// Product menu: one row per product plus a cart button
pub fn create_menu_keyboard(
    products: &[Product],
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = products
        .iter()
        .map(|product| {
            vec![InlineKeyboardButton::callback(
                product.name.clone(),
                product.id.clone(),
            )]
        })
        .collect();

    buttons.push(vec![cart_button(language_code)]);

    InlineKeyboardMarkup::new(buttons)
}

/// Caption shown under a product photo
pub fn format_product_caption(product: &Product, language_code: Option<&str>) -> String {
    let mut lines = vec![product.name.clone(), String::new()];

    if !product.price.is_empty() {
        lines.push(t_args_lang(
            "product-price",
            &[("price", &product.price)],
            language_code,
        ));
    }

    if let Some(weight) = product.weight_kg {
        lines.push(t_args_lang(
            "product-stock",
            &[("weight", &format_weight(weight))],
            language_code,
        ));
    }

    if !product.description.is_empty() {
        lines.push(String::new());
        lines.push(product.description.clone());
    }

    truncate_chars(&lines.join("\n"), MAX_CAPTION_CHARS)
}

/// Quantity choices, back to menu and cart buttons for a product card
pub fn create_product_keyboard(
    product_id: &str,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let quantities = QUANTITY_OPTIONS
        .iter()
        .map(|quantity| {
            InlineKeyboardButton::callback(
                t_args_lang(
                    "button-quantity",
                    &[("quantity", &quantity.to_string())],
                    language_code,
                ),
                Button::quantity_data(product_id, *quantity),
            )
        })
        .collect();

    InlineKeyboardMarkup::new(vec![
        quantities,
        vec![menu_button(language_code)],
        vec![cart_button(language_code)],
    ])
}

/// Cart contents as text, one block per line item, then the total
pub fn format_cart(cart: &Cart, language_code: Option<&str>) -> String {
    let mut result = String::new();

    if cart.is_empty() {
        result.push_str(&t_lang("cart-empty", language_code));
        result.push_str("\n\n");
    }

    for item in &cart.items {
        result.push_str(&item.name);
        result.push('\n');
        if !item.description.is_empty() {
            result.push_str(&item.description);
            result.push('\n');
        }
        result.push_str(&t_args_lang(
            "cart-item-price",
            &[("price", &item.unit_price)],
            language_code,
        ));
        result.push('\n');
        result.push_str(&t_args_lang(
            "cart-item-quantity",
            &[
                ("quantity", &item.quantity.to_string()),
                ("value", &item.value),
            ],
            language_code,
        ));
        result.push_str("\n\n");
    }

    result.push_str(&t_args_lang(
        "cart-total",
        &[("total", &cart.total)],
        language_code,
    ));

    result
}

/// Remove buttons for every cart line, then checkout and menu
pub fn create_cart_keyboard(cart: &Cart, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = cart
        .items
        .iter()
        .map(|item| {
            vec![InlineKeyboardButton::callback(
                t_args_lang("button-remove", &[("name", &item.name)], language_code),
                item.id.clone(),
            )]
        })
        .collect();

    if !cart.is_empty() {
        buttons.push(vec![InlineKeyboardButton::callback(
            t_lang("button-checkout", language_code),
            PAY_CALLBACK,
        )]);
    }
    buttons.push(vec![menu_button(language_code)]);

    InlineKeyboardMarkup::new(buttons)
}

/// Single "back to menu" button, shown after checkout
pub fn create_back_to_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![menu_button(language_code)]])
}

fn format_weight(kg: f64) -> String {
    if kg.fract() == 0.0 {
        format!("{kg:.0}")
    } else {
        format!("{kg}")
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}
