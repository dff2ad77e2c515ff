//! HTML builders for a small mock catalog

/// Home page with a side navigation; the first link is the catalog root
pub fn home_page(categories: &[(&str, &str)]) -> String {
    let links: String = categories
        .iter()
        .map(|(href, name)| format!(r#"<li><a href="{}">{}</a></li>"#, href, name))
        .collect();
    format!(
        r#"<html><body><div class="side_categories"><ul>
<li><a href="catalogue/category/books_1/index.html">Books</a><ul>{}</ul></li>
</ul></div></body></html>"#,
        links
    )
}

/// Category listing page linking to the given item hrefs
pub fn listing_page(hrefs: &[&str]) -> String {
    let articles: String = hrefs
        .iter()
        .map(|href| {
            format!(
                r#"<li class="col-xs-6"><article class="product_pod">
<h3><a href="{}" title="item">item</a></h3>
<p class="price_color">£1.00</p>
</article></li>"#,
                href
            )
        })
        .collect();
    format!(
        r#"<html><body><section><ol class="row">{}</ol></section></body></html>"#,
        articles
    )
}

/// Item detail page
pub fn item_page(title: &str, price: &str, available: u32, rating: &str) -> String {
    format!(
        r#"<html><body>
<ul class="breadcrumb">
  <li><a href="../../index.html">Home</a></li>
  <li><a href="../category/books_1/index.html">Books</a></li>
  <li><a href="../category/books/travel_2/index.html">Travel</a></li>
  <li class="active">{title}</li>
</ul>
<div id="product_gallery"><img src="../../media/cache/{title}.jpg" alt="{title}" /></div>
<div class="product_main">
  <h1>{title}</h1>
  <p class="price_color">£{price}</p>
  <p class="instock availability">
    <i class="icon-ok"></i> In stock ({available} available)
  </p>
  <p class="star-rating {rating}"></p>
</div>
<div id="product_description"><h2>Product Description</h2></div>
<p>About {title}.</p>
<table class="table table-striped">
  <tr><th>UPC</th><td>0000</td></tr>
  <tr><th>Product Type</th><td>Books</td></tr>
  <tr><th>Price (excl. tax)</th><td>Â£{price}</td></tr>
  <tr><th>Price (incl. tax)</th><td>Â£{price}</td></tr>
  <tr><th>Tax</th><td>Â£0.00</td></tr>
  <tr><th>Availability</th><td>In stock ({available} available)</td></tr>
  <tr><th>Number of reviews</th><td>2</td></tr>
</table>
</body></html>"#,
        title = title,
        price = price,
        available = available,
        rating = rating,
    )
}
